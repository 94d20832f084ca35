use std::future::Future;

use url::Url;

use super::{AuthError, AuthSession, OAuthClient};

/// Execute the manual copy/paste OAuth flow.
///
/// `notify_authorization_url` receives the consent URL before input is read; the
/// pasted text may be the bare code or the whole redirect URL.
pub async fn run_manual_flow<Notify, Input, Fut>(
    client: &OAuthClient,
    open_browser: bool,
    notify_authorization_url: Notify,
    mut read_input: Input,
) -> Result<AuthSession, AuthError>
where
    Notify: Fn(&Url) -> Result<(), AuthError>,
    Input: FnMut() -> Fut,
    Fut: Future<Output = Result<String, AuthError>>,
{
    let auth_url = client.authorization_url();

    notify_authorization_url(&auth_url)?;

    if open_browser {
        open::that(auth_url.as_str()).map_err(|err| AuthError::BrowserLaunch(err.to_string()))?;
    }

    let raw = read_input().await?;
    let code = parse_manual_input(raw.trim())?;

    let session = client.exchange_code(&code).await?;
    tracing::info!(location_id = %session.location_id, "access token retrieved");
    Ok(session)
}

fn parse_manual_input(input: &str) -> Result<String, AuthError> {
    if input.is_empty() {
        return Err(AuthError::InvalidAuthorizationResponse(
            "empty input".into(),
        ));
    }

    let redirect = Url::parse(input)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"));
    if let Some(url) = redirect {
        let mut code: Option<String> = None;
        let mut error: Option<String> = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                _ => {}
            }
        }
        if let Some(err) = error {
            return Err(AuthError::AccessDenied(err));
        }
        return code
            .filter(|code| !code.is_empty())
            .ok_or(AuthError::MissingAuthorizationCode);
    }

    Ok(input.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::sync::{Arc, Mutex};

    use crate::auth::OAuthEndpoints;
    use crate::config::Credentials;

    fn test_client(token_url: Url) -> OAuthClient {
        let credentials = Credentials {
            client_id: "client".into(),
            client_secret: "secret".into(),
            redirect_uri: Url::parse("https://example.com/callback").unwrap(),
        };
        let endpoints = OAuthEndpoints {
            authorization_url: Url::parse("https://marketplace.example.com/oauth/chooselocation")
                .unwrap(),
            token_url,
        };
        OAuthClient::with_endpoints(credentials, endpoints).unwrap()
    }

    #[tokio::test]
    async fn manual_flow_with_full_redirect() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/token")
                .body_contains("code=manual-code");
            then.status(200).json_body_obj(&serde_json::json!({
                "access_token": "abc",
                "token_type": "Bearer",
                "locationId": "loc-1",
            }));
        });

        let client = test_client(Url::parse(&server.url("/token")).unwrap());
        let seen_url = Arc::new(Mutex::new(None::<Url>));

        let notify = {
            let seen_url = seen_url.clone();
            move |url: &Url| {
                *seen_url.lock().unwrap() = Some(url.clone());
                Ok(())
            }
        };

        let session = run_manual_flow(&client, false, notify, || async {
            Ok("  https://example.com/callback?code=manual-code\n".to_string())
        })
        .await
        .expect("manual flow succeeded");

        mock.assert();
        assert_eq!(session.access_token, "abc");
        assert_eq!(session.location_id, "loc-1");
        let notified = seen_url.lock().unwrap().clone().expect("url notified");
        assert!(notified.query_pairs().any(|(k, v)| k == "client_id" && v == "client"));
    }

    #[tokio::test]
    async fn manual_flow_with_code_only() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/token").body_contains("code=raw-code");
            then.status(200).json_body_obj(&serde_json::json!({
                "access_token": "xyz",
                "locationId": "loc-2",
            }));
        });

        let client = test_client(Url::parse(&server.url("/token")).unwrap());
        let session = run_manual_flow(
            &client,
            false,
            |_| Ok(()),
            || async { Ok("raw-code".to_string()) },
        )
        .await
        .expect("manual flow succeeded");

        assert_eq!(session.access_token, "xyz");
    }

    #[tokio::test]
    async fn manual_flow_stops_before_exchange_on_denial() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/token");
            then.status(200);
        });

        let client = test_client(Url::parse(&server.url("/token")).unwrap());
        let err = run_manual_flow(
            &client,
            false,
            |_| Ok(()),
            || async { Ok("https://example.com/callback?error=access_denied".to_string()) },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AuthError::AccessDenied(_)));
        mock.assert_hits(0);
    }

    #[test]
    fn parse_input_handles_raw_code() {
        assert_eq!(parse_manual_input("code123").unwrap(), "code123");
    }

    #[test]
    fn parse_input_keeps_codes_with_colons() {
        assert_eq!(parse_manual_input("abc:def").unwrap(), "abc:def");
    }

    #[test]
    fn parse_input_handles_url() {
        let code = parse_manual_input("https://example.com/callback?code=abc&state=xyz").unwrap();
        assert_eq!(code, "abc");
    }

    #[test]
    fn parse_input_rejects_empty() {
        let err = parse_manual_input("").unwrap_err();
        assert!(matches!(err, AuthError::InvalidAuthorizationResponse(_)));
    }

    #[test]
    fn parse_input_url_without_code() {
        let err = parse_manual_input("https://example.com/callback?foo=bar").unwrap_err();
        assert!(matches!(err, AuthError::MissingAuthorizationCode));
    }
}
