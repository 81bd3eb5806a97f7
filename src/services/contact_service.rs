use crate::adapters::database::DbPool;
use crate::adapters::database::contact_repo::ContactRepository;
use crate::domain::contact::{BlockedUser, Contact, ContactRequest};
use crate::domain::notification::DispatchPayload;
use crate::domain::user::User;
use crate::error::{AppError, Result};
use crate::services::dispatch::DispatchService;
use crate::services::page_limit;

#[derive(Clone, Debug)]
pub struct ContactService {
    pool: DbPool,
    repo: ContactRepository,
    dispatch: DispatchService,
}

impl ContactService {
    #[must_use]
    pub const fn new(pool: DbPool, repo: ContactRepository, dispatch: DispatchService) -> Self {
        Self { pool, repo, dispatch }
    }

    /// Asks `requested_user_id` to become a contact of `user_id`.
    ///
    /// # Errors
    /// Returns `AppError::InvalidArgument` when both ids are the same user.
    /// Returns `AppError::PermissionDenied` if the requested user blocked the requester.
    /// Returns `AppError::InvalidState` if the two users are already contacts.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn create_contact_request(&self, user_id: i64, requested_user_id: i64) -> Result<ContactRequest> {
        if user_id == requested_user_id {
            return Err(AppError::InvalidArgument("Cannot request yourself as a contact".into()));
        }

        let mut conn = self.pool.acquire().await?;
        if self.repo.is_blocked(&mut conn, requested_user_id, user_id).await? {
            return Err(AppError::PermissionDenied("The user has blocked you".into()));
        }
        if self.repo.find_contact(&mut conn, user_id, requested_user_id).await?.is_some() {
            return Err(AppError::InvalidState("Users are already contacts".into()));
        }
        if let Some(existing) = self.repo.find_request(&mut conn, user_id, requested_user_id).await? {
            return Ok(existing);
        }

        let request = self.repo.insert_request(&mut conn, user_id, requested_user_id).await?;
        drop(conn);

        let payload = DispatchPayload::ContactRequest {
            request_id: request.id,
            user_id_from: user_id,
            time_created: request.time_created.unix_timestamp(),
        };
        self.dispatch.notify(requested_user_id, &payload).await;

        tracing::info!(request_id = request.id, "Contact request created");
        Ok(request)
    }

    /// Accepts the pending request from `user_id` to `requested_user_id`.
    ///
    /// # Errors
    /// Returns `AppError::InvalidState` if no such request is pending.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn confirm_contact_request(&self, user_id: i64, requested_user_id: i64) -> Result<Contact> {
        let mut tx = self.pool.begin().await?;

        if !self.repo.delete_request(&mut tx, user_id, requested_user_id).await? {
            return Err(AppError::InvalidState("Contact request does not exist".into()));
        }
        let contact = match self.repo.find_contact(&mut tx, user_id, requested_user_id).await? {
            Some(existing) => existing,
            None => self.repo.insert_contact(&mut tx, user_id, requested_user_id).await?,
        };

        tx.commit().await?;
        tracing::info!(contact_id = contact.id, "Contact request confirmed");
        Ok(contact)
    }

    /// Drops the pending request from `user_id` to `requested_user_id`, if there is one.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the deletion fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn decline_contact_request(&self, user_id: i64, requested_user_id: i64) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        if !self.repo.delete_request(&mut conn, user_id, requested_user_id).await? {
            tracing::debug!("No pending contact request to decline");
        }
        Ok(())
    }

    /// Requests received by the user, oldest first.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn get_contact_requests(
        &self,
        user_id: i64,
        limit_from: i64,
        limit_num: i64,
    ) -> Result<Vec<ContactRequest>> {
        let mut conn = self.pool.acquire().await?;
        self.repo.find_received_requests(&mut conn, user_id, limit_from.max(0), page_limit(limit_num)).await
    }

    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn get_received_contact_requests_count(&self, user_id: i64) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        self.repo.count_received_requests(&mut conn, user_id).await
    }

    /// Pending requests between two users in either direction.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn get_contact_requests_between_users(&self, user_id: i64, other_id: i64) -> Result<Vec<ContactRequest>> {
        let mut conn = self.pool.acquire().await?;
        self.repo.find_requests_between(&mut conn, user_id, other_id).await
    }

    /// Whether a request is pending between two users in either direction.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn does_contact_request_exist(&self, user_id: i64, other_id: i64) -> Result<bool> {
        Ok(!self.get_contact_requests_between_users(user_id, other_id).await?.is_empty())
    }

    /// Makes two users contacts without a request. Existing contacts are returned as is.
    ///
    /// # Errors
    /// Returns `AppError::InvalidArgument` when both ids are the same user.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn add_contact(&self, user_id: i64, contact_id: i64) -> Result<Contact> {
        if user_id == contact_id {
            return Err(AppError::InvalidArgument("Cannot add yourself as a contact".into()));
        }

        let mut tx = self.pool.begin().await?;
        let contact = match self.repo.find_contact(&mut tx, user_id, contact_id).await? {
            Some(existing) => existing,
            None => self.repo.insert_contact(&mut tx, user_id, contact_id).await?,
        };
        tx.commit().await?;
        Ok(contact)
    }

    /// Removes the contact between two users, whichever of them created it.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the deletion fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn remove_contact(&self, user_id: i64, contact_id: i64) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        self.repo.delete_contact(&mut conn, user_id, contact_id).await?;
        Ok(())
    }

    /// Symmetric contact check.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn is_contact(&self, user_id: i64, contact_id: i64) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        Ok(self.repo.find_contact(&mut conn, user_id, contact_id).await?.is_some())
    }

    /// A page of the user's contacts ordered by name.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn get_contacts(&self, user_id: i64, limit_from: i64, limit_num: i64) -> Result<Vec<User>> {
        let mut conn = self.pool.acquire().await?;
        self.repo.find_contacts(&mut conn, user_id, limit_from.max(0), page_limit(limit_num)).await
    }

    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn count_contacts(&self, user_id: i64) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        self.repo.count_contacts(&mut conn, user_id).await
    }

    /// Blocks `blocked_user_id` for `user_id`. Blocking twice returns the existing block.
    ///
    /// # Errors
    /// Returns `AppError::InvalidArgument` when both ids are the same user.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn block_user(&self, user_id: i64, blocked_user_id: i64) -> Result<BlockedUser> {
        if user_id == blocked_user_id {
            return Err(AppError::InvalidArgument("Cannot block yourself".into()));
        }
        let mut conn = self.pool.acquire().await?;
        self.repo.insert_block(&mut conn, user_id, blocked_user_id).await
    }

    /// Lifts a block if present.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the deletion fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn unblock_user(&self, user_id: i64, blocked_user_id: i64) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        self.repo.delete_block(&mut conn, user_id, blocked_user_id).await?;
        Ok(())
    }

    /// Whether `user_id` blocked `blocked_user_id`. Not symmetric.
    ///
    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn is_blocked(&self, user_id: i64, blocked_user_id: i64) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        self.repo.is_blocked(&mut conn, user_id, blocked_user_id).await
    }

    /// # Errors
    /// Returns `AppError::Database` if the query fails.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn get_blocked_users(&self, user_id: i64) -> Result<Vec<BlockedUser>> {
        let mut conn = self.pool.acquire().await?;
        self.repo.find_blocked(&mut conn, user_id).await
    }

    pub(crate) async fn contact_ids_among(&self, user_id: i64, other_ids: &[i64]) -> Result<Vec<i64>> {
        let mut conn = self.pool.acquire().await?;
        self.repo.find_contact_ids(&mut conn, user_id, other_ids).await
    }

    pub(crate) async fn blocked_ids_among(&self, user_id: i64, other_ids: &[i64]) -> Result<Vec<i64>> {
        let mut conn = self.pool.acquire().await?;
        self.repo.find_blocked_ids(&mut conn, user_id, other_ids).await
    }
}
