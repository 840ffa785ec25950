use std::fmt;

use oauth2::{AuthUrl, ClientId, ClientSecret, EndpointNotSet, EndpointSet, RedirectUrl, TokenUrl, basic::BasicClient};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AppResult, GetField};

pub type ProviderClient = BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClientProvider {
    Google,
    Github,
}

impl ClientProvider {
    pub const ALL: [ClientProvider; 2] = [ClientProvider::Google, ClientProvider::Github];

    /// Provider id understood by the identity toolkit.
    pub fn id(&self) -> &'static str {
        use ClientProvider::*;
        match self {
            Google => "google.com",
            Github => "github.com",
        }
    }

    /// Path segment and key in the clients file.
    pub fn slug(&self) -> &'static str {
        use ClientProvider::*;
        match self {
            Google => "google",
            Github => "github",
        }
    }

    fn auth_url(&self) -> &'static str {
        use ClientProvider::*;
        match self {
            Google => "https://accounts.google.com/o/oauth2/auth",
            Github => "https://github.com/login/oauth/authorize",
        }
    }

    fn token_url(&self) -> &'static str {
        use ClientProvider::*;
        match self {
            Google => "https://oauth2.googleapis.com/token",
            Github => "https://github.com/login/oauth/access_token",
        }
    }

    pub fn scopes(&self) -> &'static [&'static str] {
        use ClientProvider::*;
        match self {
            Google => &["openid", "email", "profile"],
            Github => &["read:user", "user:email"],
        }
    }
}

impl fmt::Display for ClientProvider {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ClientProvider::Google => write!(f, "Google"),
            ClientProvider::Github => write!(f, "GitHub"),
        }
    }
}

/// OAuth clients for the federated providers that have credentials.
#[derive(Clone, Default)]
pub struct Clients {
    google_client: Option<ProviderClient>,
    github_client: Option<ProviderClient>,
}

impl Clients {
    /// Reads `{ "google": { "client_id", "client_secret" }, "github": { ... } }`.
    /// Either provider may be absent.
    pub fn from_json(json: &Value, public_url: &str) -> AppResult<Clients> {
        Ok(Clients {
            google_client: build_client(json, ClientProvider::Google, public_url)?,
            github_client: build_client(json, ClientProvider::Github, public_url)?,
        })
    }

    pub fn get_client(&self, provider: ClientProvider) -> Option<&ProviderClient> {
        use ClientProvider::*;
        match provider {
            Google => self.google_client.as_ref(),
            Github => self.github_client.as_ref(),
        }
    }

    pub fn configured(&self) -> Vec<ClientProvider> {
        ClientProvider::ALL
            .into_iter()
            .filter(|provider| self.get_client(*provider).is_some())
            .collect()
    }
}

fn build_client(json: &Value, provider: ClientProvider, public_url: &str) -> AppResult<Option<ProviderClient>> {
    let Some(json) = json.get(provider.slug()) else {
        return Ok(None);
    };

    let client_id = ClientId::new(json.get_str_field("client_id")?);
    let client_secret = ClientSecret::new(json.get_str_field("client_secret")?);

    let auth_url = AuthUrl::new(provider.auth_url().to_owned())?;
    let token_url = TokenUrl::new(provider.token_url().to_owned())?;
    let redirect_url = RedirectUrl::new(format!(
        "{}/lockin/{}",
        public_url.trim_end_matches('/'),
        provider.slug()
    ))?;

    Ok(Some(
        BasicClient::new(client_id)
            .set_client_secret(client_secret)
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url),
    ))
}
