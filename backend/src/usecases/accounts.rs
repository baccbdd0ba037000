use std::sync::Arc;

use crates::{
    domain::{entities::users::InsertUserEntity, repositories::users::UserRepository},
    panel::models::{NewPanelUser, PanelError},
};
use rand::{Rng, distributions::Alphanumeric};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::auth::AuthUser;

use super::gateways::PanelGateway;

const USERNAME_BASE_MAX: usize = 20;
const USERNAME_FALLBACK: &str = "player";
const PASSWORD_LENGTH: usize = 16;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProvisionedAccount {
    pub panel_user_id: i32,
    pub username: String,
    pub created: bool,
    /// Only present on the call that created the panel account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("an email address is required to create a game panel account")]
    MissingEmail,
    #[error(
        "a game panel account with this username or email already exists but is not linked to your Discord account; contact support to link it"
    )]
    RemoteAccountUnlinked,
    #[error("game panel rejected the account details")]
    ProfileRejected(#[source] PanelError),
    #[error("game panel is unavailable")]
    PanelUnavailable(#[source] PanelError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AccountError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            AccountError::MissingEmail => StatusCode::BAD_REQUEST,
            AccountError::RemoteAccountUnlinked => StatusCode::CONFLICT,
            AccountError::ProfileRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AccountError::PanelUnavailable(_) => StatusCode::BAD_GATEWAY,
            AccountError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, AccountError>;

pub struct AccountUseCase<U, Panel>
where
    U: UserRepository + Send + Sync + 'static,
    Panel: PanelGateway + 'static,
{
    user_repo: Arc<U>,
    panel: Arc<Panel>,
}

impl<U, Panel> AccountUseCase<U, Panel>
where
    U: UserRepository + Send + Sync + 'static,
    Panel: PanelGateway + 'static,
{
    pub fn new(user_repo: Arc<U>, panel: Arc<Panel>) -> Self {
        Self { user_repo, panel }
    }

    /// Returns the caller's panel account, creating and linking one on first login.
    pub async fn get_or_create(&self, auth: &AuthUser) -> UseCaseResult<ProvisionedAccount> {
        let discord_id = auth.discord_id.as_str();

        let existing = self
            .user_repo
            .find_by_discord_id(discord_id)
            .await
            .map_err(|err| {
                error!(discord_id, db_error = ?err, "accounts: failed to load user");
                AccountError::Internal(err)
            })?;

        if let Some(user) = existing.as_ref() {
            if let Some(panel_user_id) = user.pterodactyl_id {
                return Ok(ProvisionedAccount {
                    panel_user_id,
                    username: user.username.clone(),
                    created: false,
                    password: None,
                });
            }
        }

        let remote = self
            .panel
            .get_user_by_external_id(discord_id)
            .await
            .map_err(|err| {
                error!(discord_id, error = %err, "accounts: panel lookup failed");
                AccountError::PanelUnavailable(err)
            })?;

        if let Some(panel_user) = remote {
            let user = self
                .user_repo
                .save_panel_mapping(InsertUserEntity {
                    discord_id: discord_id.to_string(),
                    username: panel_user.username.clone(),
                    email: auth.email.clone().or(Some(panel_user.email.clone())),
                    pterodactyl_id: Some(panel_user.id),
                })
                .await
                .map_err(|err| {
                    error!(discord_id, panel_user_id = panel_user.id, db_error = ?err, "accounts: failed to link existing panel user");
                    AccountError::Internal(err)
                })?;

            info!(discord_id, panel_user_id = panel_user.id, "accounts: linked existing panel user");
            return Ok(ProvisionedAccount {
                panel_user_id: panel_user.id,
                username: user.username,
                created: false,
                password: None,
            });
        }

        let email = auth.email.clone().ok_or_else(|| {
            warn!(discord_id, "accounts: cannot create panel user without email");
            AccountError::MissingEmail
        })?;

        let username = derive_username(&auth.display_name, discord_id);
        let password = generate_password();
        let first_name = match auth.display_name.trim() {
            "" => username.clone(),
            name => name.chars().take(USERNAME_BASE_MAX * 2).collect(),
        };

        let created = self
            .panel
            .create_user(NewPanelUser {
                external_id: discord_id.to_string(),
                email: email.clone(),
                username: username.clone(),
                first_name,
                last_name: "Discord".to_string(),
                password: password.clone(),
            })
            .await
            .map_err(|err| {
                if err.is_conflict() {
                    warn!(discord_id, %username, error = %err, "accounts: panel user exists but is not linked");
                    AccountError::RemoteAccountUnlinked
                } else if err.is_validation() {
                    warn!(discord_id, %username, error = %err, "accounts: panel rejected user details");
                    AccountError::ProfileRejected(err)
                } else {
                    error!(discord_id, error = %err, "accounts: panel user creation failed");
                    AccountError::PanelUnavailable(err)
                }
            })?;

        let saved = self
            .user_repo
            .save_panel_mapping(InsertUserEntity {
                discord_id: discord_id.to_string(),
                username: created.username.clone(),
                email: Some(email),
                pterodactyl_id: Some(created.id),
            })
            .await;

        if let Err(err) = saved {
            error!(discord_id, panel_user_id = created.id, db_error = ?err, "accounts: failed to persist panel mapping; deleting panel user");
            if let Err(delete_err) = self.panel.delete_user(created.id).await {
                error!(
                    discord_id,
                    panel_user_id = created.id,
                    error = %delete_err,
                    "accounts: compensating panel user delete failed; orphaned panel user"
                );
            }
            return Err(AccountError::Internal(err));
        }

        info!(discord_id, panel_user_id = created.id, %username, "accounts: panel user created");
        Ok(ProvisionedAccount {
            panel_user_id: created.id,
            username: created.username,
            created: true,
            password: Some(password),
        })
    }
}

/// Lowercased display name restricted to `[a-z0-9._-]`, plus the external id's last four characters.
pub fn derive_username(display_name: &str, external_id: &str) -> String {
    let cleaned: String = display_name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'))
        .collect();

    let capped: String = cleaned
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .chars()
        .take(USERNAME_BASE_MAX)
        .collect();
    let base = capped.trim_end_matches(|c: char| !c.is_ascii_alphanumeric());
    let base = if base.is_empty() { USERNAME_FALLBACK } else { base };

    let chars: Vec<char> = external_id.chars().collect();
    let suffix: String = chars[chars.len().saturating_sub(4)..].iter().collect();

    format!("{}_{}", base, suffix)
}

pub fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::gateways::MockPanelGateway;
    use anyhow::anyhow;
    use chrono::Utc;
    use crates::{
        domain::{entities::users::UserEntity, repositories::users::MockUserRepository},
        panel::models::{PanelErrorDetail, PanelUser},
    };
    use mockall::predicate::eq;
    use std::sync::Mutex;
    use uuid::Uuid;

    fn auth() -> AuthUser {
        AuthUser {
            discord_id: "123456789012340042".to_string(),
            display_name: "Steve".to_string(),
            email: Some("steve@example.com".to_string()),
        }
    }

    fn panel_user(id: i32, username: &str) -> PanelUser {
        PanelUser {
            id,
            external_id: Some("123456789012340042".to_string()),
            uuid: Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: "steve@example.com".to_string(),
            first_name: "Steve".to_string(),
            last_name: "Discord".to_string(),
        }
    }

    fn user_row(insert: &InsertUserEntity) -> UserEntity {
        UserEntity {
            id: Uuid::new_v4(),
            discord_id: insert.discord_id.clone(),
            username: insert.username.clone(),
            email: insert.email.clone(),
            pterodactyl_id: insert.pterodactyl_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn username_keeps_safe_characters_and_appends_id_suffix() {
        assert_eq!(derive_username("Steve", "123456789012340042"), "steve_0042");
        assert_eq!(derive_username("  Mr. Créeper!! ", "99991234"), "mr.creper_1234");
        assert_eq!(derive_username("__x__", "1234"), "x_1234");
    }

    #[test]
    fn username_falls_back_and_caps_length() {
        assert_eq!(derive_username("🎮🎮", "5678"), "player_5678");
        assert_eq!(derive_username("", "12"), "player_12");

        let long = derive_username("abcdefghijklmnopqrstuvwxyz", "0001");
        assert_eq!(long, "abcdefghijklmnopqrst_0001");
    }

    #[test]
    fn password_is_sixteen_alphanumerics() {
        let password = generate_password();
        assert_eq!(password.len(), PASSWORD_LENGTH);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(password, generate_password());
    }

    #[tokio::test]
    async fn linked_user_is_returned_without_panel_calls() {
        let mut user_repo = MockUserRepository::new();
        let panel = MockPanelGateway::new();

        user_repo
            .expect_find_by_discord_id()
            .returning(|discord_id| {
                let row = user_row(&InsertUserEntity {
                    discord_id: discord_id.to_string(),
                    username: "steve_0042".to_string(),
                    email: None,
                    pterodactyl_id: Some(42),
                });
                Box::pin(async move { Ok(Some(row)) })
            });

        let usecase = AccountUseCase::new(Arc::new(user_repo), Arc::new(panel));
        let account = usecase.get_or_create(&auth()).await.unwrap();

        assert_eq!(account.panel_user_id, 42);
        assert!(!account.created);
        assert_eq!(account.password, None);
    }

    #[tokio::test]
    async fn calling_twice_creates_one_panel_user_and_one_mapping() {
        let rows: Arc<Mutex<Vec<UserEntity>>> = Arc::default();
        let mut user_repo = MockUserRepository::new();
        let mut panel = MockPanelGateway::new();

        let read = Arc::clone(&rows);
        user_repo.expect_find_by_discord_id().returning(move |discord_id| {
            let found = read
                .lock()
                .unwrap()
                .iter()
                .find(|row| row.discord_id == discord_id)
                .cloned();
            Box::pin(async move { Ok(found) })
        });

        let write = Arc::clone(&rows);
        user_repo
            .expect_save_panel_mapping()
            .times(1)
            .returning(move |insert| {
                let row = user_row(&insert);
                write.lock().unwrap().push(row.clone());
                Box::pin(async move { Ok(row) })
            });

        panel
            .expect_get_user_by_external_id()
            .times(1)
            .returning(|_| Ok(None));
        panel
            .expect_create_user()
            .times(1)
            .withf(|user| user.external_id == "123456789012340042" && user.username == "steve_0042")
            .returning(|user| Ok(panel_user(42, &user.username)));

        let usecase = AccountUseCase::new(Arc::new(user_repo), Arc::new(panel));

        let first = usecase.get_or_create(&auth()).await.unwrap();
        let second = usecase.get_or_create(&auth()).await.unwrap();

        assert_eq!(first.panel_user_id, 42);
        assert_eq!(second.panel_user_id, 42);
        assert!(first.created);
        assert!(first.password.is_some());
        assert!(!second.created);
        assert_eq!(second.password, None);
        assert_eq!(rows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_mapping_insert_deletes_the_new_panel_user() {
        let remote_users: Arc<Mutex<Vec<i32>>> = Arc::default();
        let mut user_repo = MockUserRepository::new();
        let mut panel = MockPanelGateway::new();

        user_repo
            .expect_find_by_discord_id()
            .returning(|_| Box::pin(async { Ok(None) }));
        user_repo
            .expect_save_panel_mapping()
            .returning(|_| Box::pin(async { Err(anyhow!("unique violation")) }));

        panel
            .expect_get_user_by_external_id()
            .returning(|_| Ok(None));
        let created = Arc::clone(&remote_users);
        panel.expect_create_user().returning(move |user| {
            created.lock().unwrap().push(77);
            Ok(panel_user(77, &user.username))
        });
        let deleted = Arc::clone(&remote_users);
        panel
            .expect_delete_user()
            .with(eq(77))
            .times(1)
            .returning(move |id| {
                deleted.lock().unwrap().retain(|existing| *existing != id);
                Ok(())
            });

        let usecase = AccountUseCase::new(Arc::new(user_repo), Arc::new(panel));
        let err = usecase.get_or_create(&auth()).await.unwrap_err();

        assert!(matches!(err, AccountError::Internal(_)));
        assert_eq!(err.status_code(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        assert!(remote_users.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn existing_remote_user_is_linked_not_recreated() {
        let mut user_repo = MockUserRepository::new();
        let mut panel = MockPanelGateway::new();

        user_repo
            .expect_find_by_discord_id()
            .returning(|_| Box::pin(async { Ok(None) }));
        user_repo
            .expect_save_panel_mapping()
            .withf(|insert| insert.pterodactyl_id == Some(9))
            .times(1)
            .returning(|insert| {
                let row = user_row(&insert);
                Box::pin(async move { Ok(row) })
            });
        panel
            .expect_get_user_by_external_id()
            .returning(|_| Ok(Some(panel_user(9, "steve"))));
        panel.expect_create_user().never();

        let usecase = AccountUseCase::new(Arc::new(user_repo), Arc::new(panel));
        let account = usecase.get_or_create(&auth()).await.unwrap();

        assert_eq!(account.panel_user_id, 9);
        assert_eq!(account.username, "steve");
        assert!(!account.created);
    }

    #[tokio::test]
    async fn taken_username_maps_to_unlinked_account_error() {
        let mut user_repo = MockUserRepository::new();
        let mut panel = MockPanelGateway::new();

        user_repo
            .expect_find_by_discord_id()
            .returning(|_| Box::pin(async { Ok(None) }));
        user_repo.expect_save_panel_mapping().never();
        panel
            .expect_get_user_by_external_id()
            .returning(|_| Ok(None));
        panel.expect_create_user().returning(|_| {
            Err(PanelError::Rejected {
                status: 422,
                errors: vec![PanelErrorDetail {
                    code: "ValidationException".to_string(),
                    status: "422".to_string(),
                    detail: "The email has already been taken.".to_string(),
                }],
            })
        });

        let usecase = AccountUseCase::new(Arc::new(user_repo), Arc::new(panel));
        let err = usecase.get_or_create(&auth()).await.unwrap_err();

        assert!(matches!(err, AccountError::RemoteAccountUnlinked));
        assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn invalid_details_are_not_reported_as_unlinked_account() {
        let mut user_repo = MockUserRepository::new();
        let mut panel = MockPanelGateway::new();

        user_repo
            .expect_find_by_discord_id()
            .returning(|_| Box::pin(async { Ok(None) }));
        user_repo.expect_save_panel_mapping().never();
        panel
            .expect_get_user_by_external_id()
            .returning(|_| Ok(None));
        panel.expect_create_user().returning(|_| {
            Err(PanelError::Rejected {
                status: 422,
                errors: vec![PanelErrorDetail {
                    code: "ValidationException".to_string(),
                    status: "422".to_string(),
                    detail: "The email must be a valid email address.".to_string(),
                }],
            })
        });

        let usecase = AccountUseCase::new(Arc::new(user_repo), Arc::new(panel));
        let err = usecase.get_or_create(&auth()).await.unwrap_err();

        assert!(matches!(err, AccountError::ProfileRejected(_)));
        assert_eq!(
            err.status_code(),
            axum::http::StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[tokio::test]
    async fn new_account_without_email_is_rejected_before_creation() {
        let mut user_repo = MockUserRepository::new();
        let mut panel = MockPanelGateway::new();

        user_repo
            .expect_find_by_discord_id()
            .returning(|_| Box::pin(async { Ok(None) }));
        panel
            .expect_get_user_by_external_id()
            .returning(|_| Ok(None));
        panel.expect_create_user().never();

        let usecase = AccountUseCase::new(Arc::new(user_repo), Arc::new(panel));
        let mut no_email = auth();
        no_email.email = None;

        let err = usecase.get_or_create(&no_email).await.unwrap_err();
        assert!(matches!(err, AccountError::MissingEmail));
    }
}
