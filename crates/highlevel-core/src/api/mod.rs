mod client;

pub use client::{
    ApiError, ApiResult, Contact, CustomField, CustomFieldValue, HighLevelClient,
};
