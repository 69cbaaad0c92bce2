// SPDX-FileCopyrightText: 2026 Myemtee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for a Cognito-compatible user pool.
//!
//! Every operation is a POST of a JSON body to the regional endpoint, with the
//! operation named in the `X-Amz-Target` header. Public app clients need no
//! request signing.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use myemtee_config::model::IdentityConfig;
use myemtee_core::{
    AdapterType, AuthResponse, AuthTokens, CodeDelivery, HealthStatus, IdentityProvider,
    MfaChallenge, MyemteeError, NewDeviceMetadata, PluginAdapter, SignUpResult, UserInfo,
};

use crate::wire::{
    AccessTokenRequest, AttributeType, AuthChallengeResponse, CodeDeliveryDetails,
    ConfirmDeviceRequest, ConfirmForgotPasswordRequest, ConfirmSignUpRequest, Empty, ErrorBody,
    ForgotPasswordRequest, ForgotPasswordResponse, GetUserResponse, InitiateAuthRequest,
    RespondToAuthChallengeRequest, SignUpRequest, SignUpResponse, UpdateDeviceStatusRequest,
};

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const AMZ_JSON: &str = "application/x-amz-json-1.1";

/// Challenges answered with a one-time code.
const MFA_CHALLENGES: &[&str] = &["SOFTWARE_TOKEN_MFA", "SMS_MFA"];

/// User-pool identity provider speaking the Cognito JSON protocol.
#[derive(Debug, Clone)]
pub struct CognitoIdentityProvider {
    client: reqwest::Client,
    endpoint: String,
    client_id: String,
}

impl CognitoIdentityProvider {
    /// Build a provider from configuration. Fails when no app client id is set.
    pub fn new(config: &IdentityConfig) -> Result<Self, MyemteeError> {
        if config.client_id.trim().is_empty() {
            return Err(MyemteeError::Config(
                "identity.client_id is required to contact the identity provider".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MyemteeError::Provider {
                code: None,
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint_url(),
            client_id: config.client_id.clone(),
        })
    }

    async fn call<Req, Resp>(&self, operation: &str, body: &Req) -> Result<Resp, MyemteeError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body).map_err(|e| {
            MyemteeError::Internal(format!("failed to encode {operation} request: {e}"))
        })?;

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{operation}"))
            .header(CONTENT_TYPE, HeaderValue::from_static(AMZ_JSON))
            .body(payload)
            .send()
            .await
            .map_err(|e| MyemteeError::Provider {
                code: None,
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(operation, status = %status, "identity provider response received");

        let text = response.text().await.map_err(|e| MyemteeError::Provider {
            code: None,
            message: format!("failed to read response body: {e}"),
            source: Some(Box::new(e)),
        })?;

        if !status.is_success() {
            return Err(map_error(status, &text));
        }

        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| MyemteeError::Provider {
            code: None,
            message: format!("failed to parse {operation} response: {e}"),
            source: Some(Box::new(e)),
        })
    }

    fn auth_response(username: &str, resp: AuthChallengeResponse) -> Result<AuthResponse, MyemteeError> {
        if let Some(result) = resp.authentication_result {
            return Ok(AuthResponse::Authenticated {
                tokens: AuthTokens {
                    access_token: result.access_token,
                    id_token: result.id_token,
                    refresh_token: result.refresh_token,
                },
                new_device: result.new_device_metadata.map(|d| NewDeviceMetadata {
                    device_key: d.device_key,
                    device_group_key: d.device_group_key,
                }),
            });
        }

        match resp.challenge_name {
            Some(name) if MFA_CHALLENGES.contains(&name.as_str()) => {
                let session = resp.session.ok_or_else(|| {
                    MyemteeError::provider(None, format!("{name} challenge without a session"))
                })?;
                Ok(AuthResponse::MfaRequired(MfaChallenge {
                    username: username.to_string(),
                    challenge_name: name,
                    session,
                }))
            }
            Some(name) => Err(MyemteeError::UnsupportedChallenge(name)),
            None => Err(MyemteeError::provider(
                None,
                "response carried neither tokens nor a challenge",
            )),
        }
    }
}

/// Map an error response to the client's error taxonomy.
fn map_error(status: reqwest::StatusCode, body: &str) -> MyemteeError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let (code, message) = match parsed {
        Some(ErrorBody {
            error_type,
            message,
        }) => (
            error_type.map(|t| t.rsplit('#').next().unwrap_or(&t).to_string()),
            message.unwrap_or_default(),
        ),
        None => (None, body.to_string()),
    };

    if code.as_deref() == Some("NotAuthorizedException") {
        return MyemteeError::NotAuthorized(message);
    }

    let label = code.as_deref().unwrap_or("HTTP error");
    MyemteeError::Provider {
        message: format!("{label} ({status}): {message}"),
        code,
        source: None,
    }
}

fn code_delivery(details: Option<CodeDeliveryDetails>) -> Option<CodeDelivery> {
    details.map(|d| CodeDelivery {
        destination: d.destination,
        medium: d.delivery_medium,
    })
}

#[async_trait]
impl PluginAdapter for CognitoIdentityProvider {
    fn name(&self) -> &str {
        "cognito"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::IdentityProvider
    }

    async fn health_check(&self) -> Result<HealthStatus, MyemteeError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MyemteeError> {
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for CognitoIdentityProvider {
    async fn initiate_auth(
        &self,
        username: &str,
        password: &SecretString,
        device_key: Option<&str>,
    ) -> Result<AuthResponse, MyemteeError> {
        let mut params = BTreeMap::from([
            ("USERNAME", username),
            ("PASSWORD", password.expose_secret()),
        ]);
        if let Some(key) = device_key {
            params.insert("DEVICE_KEY", key);
        }
        let request = InitiateAuthRequest {
            auth_flow: "USER_PASSWORD_AUTH",
            client_id: &self.client_id,
            auth_parameters: params,
        };
        let resp: AuthChallengeResponse = self.call("InitiateAuth", &request).await?;
        Self::auth_response(username, resp)
    }

    async fn respond_to_mfa(
        &self,
        challenge: &MfaChallenge,
        code: &str,
    ) -> Result<AuthResponse, MyemteeError> {
        let request = RespondToAuthChallengeRequest {
            challenge_name: &challenge.challenge_name,
            client_id: &self.client_id,
            session: &challenge.session,
            challenge_responses: BTreeMap::from([
                ("USERNAME".to_string(), challenge.username.as_str()),
                (format!("{}_CODE", challenge.challenge_name), code),
            ]),
        };
        let resp: AuthChallengeResponse = self.call("RespondToAuthChallenge", &request).await?;
        Self::auth_response(&challenge.username, resp)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, MyemteeError> {
        let request = InitiateAuthRequest {
            auth_flow: "REFRESH_TOKEN_AUTH",
            client_id: &self.client_id,
            auth_parameters: BTreeMap::from([("REFRESH_TOKEN", refresh_token)]),
        };
        let resp: AuthChallengeResponse = self.call("InitiateAuth", &request).await?;
        match Self::auth_response("", resp)? {
            AuthResponse::Authenticated { tokens, .. } => Ok(tokens),
            AuthResponse::MfaRequired(challenge) => {
                Err(MyemteeError::UnsupportedChallenge(challenge.challenge_name))
            }
        }
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &SecretString,
        name: &str,
    ) -> Result<SignUpResult, MyemteeError> {
        let request = SignUpRequest {
            client_id: &self.client_id,
            username: email,
            password: password.expose_secret(),
            user_attributes: vec![
                AttributeType {
                    name: "email".into(),
                    value: email.into(),
                },
                AttributeType {
                    name: "name".into(),
                    value: name.into(),
                },
            ],
        };
        let resp: SignUpResponse = self.call("SignUp", &request).await?;
        Ok(SignUpResult {
            user_sub: resp.user_sub,
            confirmed: resp.user_confirmed,
            code_delivery: code_delivery(resp.code_delivery_details),
        })
    }

    async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<(), MyemteeError> {
        let request = ConfirmSignUpRequest {
            client_id: &self.client_id,
            username,
            confirmation_code: code,
        };
        let _: Empty = self.call("ConfirmSignUp", &request).await?;
        Ok(())
    }

    async fn forgot_password(&self, username: &str) -> Result<Option<CodeDelivery>, MyemteeError> {
        let request = ForgotPasswordRequest {
            client_id: &self.client_id,
            username,
        };
        let resp: ForgotPasswordResponse = self.call("ForgotPassword", &request).await?;
        Ok(code_delivery(resp.code_delivery_details))
    }

    async fn confirm_forgot_password(
        &self,
        username: &str,
        code: &str,
        new_password: &SecretString,
    ) -> Result<(), MyemteeError> {
        let request = ConfirmForgotPasswordRequest {
            client_id: &self.client_id,
            username,
            confirmation_code: code,
            password: new_password.expose_secret(),
        };
        let _: Empty = self.call("ConfirmForgotPassword", &request).await?;
        Ok(())
    }

    async fn global_sign_out(&self, access_token: &str) -> Result<(), MyemteeError> {
        let _: Empty = self
            .call("GlobalSignOut", &AccessTokenRequest { access_token })
            .await?;
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<UserInfo, MyemteeError> {
        let resp: GetUserResponse = self
            .call("GetUser", &AccessTokenRequest { access_token })
            .await?;

        let mut info = UserInfo {
            username: resp.username,
            ..Default::default()
        };
        for attr in resp.user_attributes {
            match attr.name.as_str() {
                "sub" => info.sub = Some(attr.value),
                "email" => info.email = Some(attr.value),
                "name" => info.name = Some(attr.value),
                "picture" => info.picture = Some(attr.value),
                "email_verified" => info.email_verified = attr.value == "true",
                _ => {}
            }
        }
        Ok(info)
    }

    async fn confirm_device(
        &self,
        access_token: &str,
        device: &NewDeviceMetadata,
        device_name: &str,
    ) -> Result<(), MyemteeError> {
        let request = ConfirmDeviceRequest {
            access_token,
            device_key: &device.device_key,
            device_name,
        };
        let _: Empty = self.call("ConfirmDevice", &request).await?;
        Ok(())
    }

    async fn update_device_status(
        &self,
        access_token: &str,
        device_key: &str,
        remembered: bool,
    ) -> Result<(), MyemteeError> {
        let request = UpdateDeviceStatusRequest {
            access_token,
            device_key,
            device_remembered_status: if remembered {
                "remembered"
            } else {
                "not_remembered"
            },
        };
        let _: Empty = self.call("UpdateDeviceStatus", &request).await?;
        Ok(())
    }
}
