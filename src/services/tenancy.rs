use crate::{
    auth::{AuthUser, TenantContext},
    common::Clock,
    db::{with_timeout, DbPool},
    entities::{
        company,
        membership::{self, Role},
        user,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use slog::Logger;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Member of a company as listed to other members
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemberView {
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

impl MemberView {
    fn from_parts(member: membership::Model, user: user::Model) -> Self {
        Self {
            user_id: user.id,
            email: user.email,
            name: user.name,
            phone: user.phone,
            role: member.role,
            joined_at: member.created_at,
        }
    }
}

/// A company the caller belongs to
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompanyMembershipView {
    pub company_id: Uuid,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateCompanyInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct InviteMemberInput {
    #[validate(email)]
    pub email: String,
    pub role: Role,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 3, max = 40))]
    pub phone: Option<String>,
    #[validate(length(min = 8, max = 128))]
    pub password: Option<String>,
}

/// Companies, memberships and the per-request tenant lookup
#[derive(Clone)]
pub struct TenancyService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
    logger: Logger,
}

impl TenancyService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        clock: Arc<dyn Clock>,
        store_timeout: Duration,
        logger: Logger,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            clock,
            store_timeout,
            logger,
        }
    }

    /// `CompanyNotFound` when the company is missing, `NotMember` when the
    /// caller holds no membership in it.
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        company_id: Uuid,
        user_id: Uuid,
    ) -> Result<TenantContext, ServiceError> {
        let db = &*self.db_pool;
        with_timeout(self.store_timeout, "tenant.resolve", async {
            company::Entity::find_by_id(company_id)
                .one(db)
                .await?
                .ok_or_else(|| {
                    ServiceError::CompanyNotFound(format!("Company {} not found", company_id))
                })?;

            let member = membership::Entity::find()
                .filter(membership::Column::CompanyId.eq(company_id))
                .filter(membership::Column::UserId.eq(user_id))
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::NotMember(company_id.to_string()))?;

            Ok(TenantContext {
                company_id,
                user_id,
                role: member.role,
            })
        })
        .await
    }

    /// Creates a company owned by the caller.
    #[instrument(skip(self, principal, input), fields(user_id = %principal.user_id))]
    pub async fn create_company(
        &self,
        principal: &AuthUser,
        input: CreateCompanyInput,
    ) -> Result<CompanyMembershipView, ServiceError> {
        input.validate()?;
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::ValidationError(
                "company name must not be blank".into(),
            ));
        }

        let now = self.clock.now();
        let db = &*self.db_pool;

        let company = with_timeout(self.store_timeout, "tenant.create_company", async {
            let txn = db.begin().await?;

            if user::Entity::find_by_id(principal.user_id)
                .one(&txn)
                .await?
                .is_none()
            {
                let email = principal.email.clone().ok_or_else(|| {
                    ServiceError::ValidationError(
                        "token has no email claim to register the caller".into(),
                    )
                })?;
                user::ActiveModel {
                    id: Set(principal.user_id),
                    email: Set(email),
                    name: Set(principal.name.clone()),
                    phone: Set(None),
                    password_hash: Set(None),
                    created_at: Set(now),
                }
                .insert(&txn)
                .await
                .map_err(|e| conflict_on_unique(e, "email already registered to another user"))?;
            }

            let company = company::ActiveModel {
                id: Set(Uuid::new_v4()),
                name: Set(name),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;

            membership::ActiveModel {
                id: Set(Uuid::new_v4()),
                company_id: Set(company.id),
                user_id: Set(principal.user_id),
                role: Set(Role::Owner),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;

            txn.commit().await?;
            Ok(company)
        })
        .await?;

        slog::info!(self.logger, "Company created"; "company_id" => %company.id);
        info!(company_id = %company.id, "company created");

        Ok(CompanyMembershipView {
            company_id: company.id,
            name: company.name,
            role: Role::Owner,
            created_at: company.created_at,
        })
    }

    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    pub async fn list_companies(
        &self,
        principal: &AuthUser,
    ) -> Result<Vec<CompanyMembershipView>, ServiceError> {
        let db = &*self.db_pool;
        let rows = with_timeout(self.store_timeout, "tenant.list_companies", async {
            Ok(membership::Entity::find()
                .filter(membership::Column::UserId.eq(principal.user_id))
                .find_also_related(company::Entity)
                .order_by_asc(membership::Column::CreatedAt)
                .all(db)
                .await?)
        })
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(member, company)| {
                company.map(|company| CompanyMembershipView {
                    company_id: company.id,
                    name: company.name,
                    role: member.role,
                    created_at: company.created_at,
                })
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn list_members(&self, company_id: Uuid) -> Result<Vec<MemberView>, ServiceError> {
        let db = &*self.db_pool;
        let rows = with_timeout(self.store_timeout, "tenant.list_members", async {
            Ok(membership::Entity::find()
                .filter(membership::Column::CompanyId.eq(company_id))
                .find_also_related(user::Entity)
                .order_by_asc(membership::Column::CreatedAt)
                .all(db)
                .await?)
        })
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(member, user)| user.map(|user| MemberView::from_parts(member, user)))
            .collect())
    }

    /// Adds a user to the company, registering the user first if the email
    /// is unknown.
    #[instrument(skip(self, input), fields(email = %input.email, role = %input.role))]
    pub async fn invite(
        &self,
        company_id: Uuid,
        input: InviteMemberInput,
    ) -> Result<MemberView, ServiceError> {
        input.validate()?;
        if input.role == Role::Owner {
            return Err(ServiceError::ValidationError(
                "invited members cannot be owners".into(),
            ));
        }

        let email = input.email.trim().to_lowercase();
        let password_hash = input.password.as_deref().map(hash_password).transpose()?;
        let now = self.clock.now();
        let db = &*self.db_pool;

        let (member, user) = with_timeout(self.store_timeout, "tenant.invite", async {
            let txn = db.begin().await?;

            let user = match user::Entity::find()
                .filter(user::Column::Email.eq(email.clone()))
                .one(&txn)
                .await?
            {
                Some(existing) => existing,
                None => {
                    user::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        email: Set(email.clone()),
                        name: Set(input.name.clone()),
                        phone: Set(input.phone.clone()),
                        password_hash: Set(password_hash),
                        created_at: Set(now),
                    }
                    .insert(&txn)
                    .await?
                }
            };

            let already_member = membership::Entity::find()
                .filter(membership::Column::CompanyId.eq(company_id))
                .filter(membership::Column::UserId.eq(user.id))
                .one(&txn)
                .await?
                .is_some();
            if already_member {
                return Err(ServiceError::Conflict(format!(
                    "{} is already a member of this company",
                    email
                )));
            }

            let member = membership::ActiveModel {
                id: Set(Uuid::new_v4()),
                company_id: Set(company_id),
                user_id: Set(user.id),
                role: Set(input.role),
                created_at: Set(now),
            }
            .insert(&txn)
            .await
            .map_err(|e| conflict_on_unique(e, "user is already a member of this company"))?;

            txn.commit().await?;
            Ok((member, user))
        })
        .await?;

        slog::info!(self.logger, "Member invited";
            "company_id" => %company_id,
            "user_id" => %user.id,
            "role" => member.role.as_str());
        self.event_sender
            .publish(Event::MemberInvited {
                company_id,
                user_id: user.id,
                role: member.role.to_string(),
            })
            .await;

        Ok(MemberView::from_parts(member, user))
    }

    /// The owner's membership is fixed and nobody can be promoted to owner.
    #[instrument(skip(self))]
    pub async fn change_role(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> Result<MemberView, ServiceError> {
        if role == Role::Owner {
            return Err(ServiceError::ValidationError(
                "ownership cannot be granted through a role change".into(),
            ));
        }

        let db = &*self.db_pool;
        let (member, user) = with_timeout(self.store_timeout, "tenant.change_role", async {
            let (member, user) = self.find_member(company_id, user_id).await?;
            if member.role == Role::Owner {
                return Err(ServiceError::InvalidOperation(
                    "the owner's role cannot be changed".into(),
                ));
            }

            let mut active: membership::ActiveModel = member.into();
            active.role = Set(role);
            let member = active.update(db).await?;
            Ok((member, user))
        })
        .await?;

        info!(%company_id, %user_id, role = %role, "member role changed");
        Ok(MemberView::from_parts(member, user))
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, company_id: Uuid, user_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        with_timeout(self.store_timeout, "tenant.remove_member", async {
            let (member, _) = self.find_member(company_id, user_id).await?;
            if member.role == Role::Owner {
                return Err(ServiceError::InvalidOperation(
                    "the owner cannot be removed".into(),
                ));
            }
            member.delete(db).await?;
            Ok(())
        })
        .await?;

        info!(%company_id, %user_id, "member removed");
        Ok(())
    }

    async fn find_member(
        &self,
        company_id: Uuid,
        user_id: Uuid,
    ) -> Result<(membership::Model, user::Model), ServiceError> {
        let not_found = || ServiceError::NotFound(format!("Member {} not found", user_id));
        let (member, user) = membership::Entity::find()
            .filter(membership::Column::CompanyId.eq(company_id))
            .filter(membership::Column::UserId.eq(user_id))
            .find_also_related(user::Entity)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(not_found)?;
        let user = user.ok_or_else(not_found)?;
        Ok((member, user))
    }
}

fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::InternalError(format!("password hashing failed: {}", e)))
}

fn conflict_on_unique(err: sea_orm::DbErr, message: &str) -> ServiceError {
    let err = ServiceError::from(err);
    if err.is_unique_violation() {
        ServiceError::Conflict(message.to_string())
    } else {
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::{PasswordHash, PasswordVerifier};

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("correct horse battery").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default()
            .verify_password(b"correct horse battery", &parsed)
            .is_ok());
        assert!(Argon2::default().verify_password(b"wrong", &parsed).is_err());
    }

    #[test]
    fn invite_input_rejects_bad_email() {
        let input = InviteMemberInput {
            email: "not-an-email".into(),
            role: Role::Seller,
            name: None,
            phone: None,
            password: None,
        };
        assert!(input.validate().is_err());
    }
}
