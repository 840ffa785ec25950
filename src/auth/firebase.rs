use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::debug;

use super::{AuthError, ClientProvider, Identity, Principal};

pub const DEFAULT_AUTH_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Identity Toolkit REST client (email/password and IdP sign-in).
#[derive(Clone)]
pub struct FirebaseIdentity {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdpRequest {
    post_body: String,
    request_uri: String,
    return_idp_credential: bool,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
}

impl From<AccountResponse> for Principal {
    fn from(account: AccountResponse) -> Self {
        Principal {
            uid: account.local_id,
            email: account.email.filter(|e| !e.is_empty()),
            display_name: account.display_name.filter(|n| !n.is_empty()),
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl FirebaseIdentity {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/accounts:{method}?key={}",
            self.base_url.trim_end_matches('/'),
            self.api_key
        )
    }

    async fn call<B: Serialize, R: DeserializeOwned>(&self, method: &str, body: &B) -> Result<R, AuthError> {
        let response = self.http.post(self.endpoint(method)).json(body).send().await?;
        let status = response.status();
        debug!(%method, %status, "identity toolkit");

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| AuthError::Malformed(e.to_string()));
        }

        let ErrorEnvelope { error } = response
            .json()
            .await
            .map_err(|e| AuthError::Malformed(format!("{status}: {e}")))?;
        Err(AuthError::from_provider_message(&error.message))
    }
}

#[async_trait]
impl Identity for FirebaseIdentity {
    async fn create_account(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        let account: AccountResponse = self
            .call(
                "signUp",
                &PasswordRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;
        Ok(account.into())
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        let account: AccountResponse = self
            .call(
                "signInWithPassword",
                &PasswordRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;
        Ok(account.into())
    }

    async fn authenticate_federated(
        &self,
        provider: ClientProvider,
        access_token: &str,
    ) -> Result<Principal, AuthError> {
        let account: AccountResponse = self
            .call(
                "signInWithIdp",
                &IdpRequest {
                    post_body: format!("access_token={access_token}&providerId={}", provider.id()),
                    request_uri: "http://localhost/".to_owned(),
                    return_idp_credential: true,
                    return_secure_token: true,
                },
            )
            .await?;
        Ok(account.into())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn endpoint_joins_base_and_key() {
        let identity = FirebaseIdentity::new(reqwest::Client::new(), "http://127.0.0.1:9099/v1/", "k");
        assert_eq!(
            identity.endpoint("signUp"),
            "http://127.0.0.1:9099/v1/accounts:signUp?key=k"
        );
    }

    #[test]
    fn account_response_to_principal() {
        let account: AccountResponse = serde_json::from_value(json!({
            "kind": "identitytoolkit#SignupNewUserResponse",
            "localId": "abc",
            "email": "a@b.c",
            "displayName": "",
            "idToken": "token",
        }))
        .unwrap();

        let principal = Principal::from(account);
        assert_eq!(principal.uid, "abc");
        assert_eq!(principal.email.as_deref(), Some("a@b.c"));
        assert!(principal.display_name.is_none());
    }

    #[test]
    fn idp_request_shape() {
        let body = serde_json::to_value(IdpRequest {
            post_body: "access_token=t&providerId=google.com".into(),
            request_uri: "http://localhost/".into(),
            return_idp_credential: true,
            return_secure_token: true,
        })
        .unwrap();
        assert_eq!(body["postBody"], "access_token=t&providerId=google.com");
        assert_eq!(body["returnSecureToken"], true);
    }
}
