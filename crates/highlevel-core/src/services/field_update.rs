use crate::api::{ApiResult, HighLevelClient};

pub const DEFAULT_VALUE: &str = "TEST";

/// Result of a [`FieldUpdateTask`] run, naming the step that ended it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdateOutcome {
    Updated { contact_id: String, field_id: String },
    UpdateRejected { contact_id: String, field_id: String },
    /// Contact and field were resolved but the write was skipped.
    DryRun { contact_id: String, field_id: String },
    NoContacts,
    FieldNotFound { name: String },
}

impl FieldUpdateOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Updated { .. } | Self::DryRun { .. })
    }
}

/// Picks a random contact and writes `value` into the custom field called `field_name`.
pub struct FieldUpdateTask<'a> {
    client: &'a HighLevelClient,
    field_name: String,
    value: String,
    dry_run: bool,
}

impl<'a> FieldUpdateTask<'a> {
    pub fn new(client: &'a HighLevelClient, field_name: impl Into<String>) -> Self {
        Self {
            client,
            field_name: field_name.into(),
            value: DEFAULT_VALUE.to_owned(),
            dry_run: false,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn run(&self) -> ApiResult<FieldUpdateOutcome> {
        let Some(contact) = self.client.pick_random_contact().await? else {
            return Ok(FieldUpdateOutcome::NoContacts);
        };

        let Some(field_id) = self
            .client
            .find_custom_field_id_by_name(&self.field_name)
            .await?
        else {
            return Ok(FieldUpdateOutcome::FieldNotFound {
                name: self.field_name.clone(),
            });
        };

        let contact_id = contact.id;
        if self.dry_run {
            tracing::info!(%contact_id, %field_id, value = %self.value, "dry run; skipping update");
            return Ok(FieldUpdateOutcome::DryRun {
                contact_id,
                field_id,
            });
        }

        let updated = self
            .client
            .update_contact_custom_field(&contact_id, &field_id, &self.value)
            .await?;

        Ok(if updated {
            FieldUpdateOutcome::Updated {
                contact_id,
                field_id,
            }
        } else {
            FieldUpdateOutcome::UpdateRejected {
                contact_id,
                field_id,
            }
        })
    }
}
