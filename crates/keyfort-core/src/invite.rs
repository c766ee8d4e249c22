//! Org-key transfer to new members.
//!
//! Inviting someone means re-encrypting the org key for them: the
//! inviter opens their own copy (password path), the key is sealed to
//! the invitee's public key, and the sealed blob rides on the invite
//! record. Accepting later does no crypto at all — it just moves the
//! precomputed blob into the new member's org-key-copy row, so the
//! invitee's password is never involved and the inviter does not need
//! to be online at accept time.

use std::sync::Arc;

use chrono::Utc;
use keyfort_storage::{InviteRecord, MemberKeyRecord, MemberRole, Principal, Store};
use tracing::info;
use uuid::Uuid;

use crate::error::{InviteError, KeyError, OrgKeyError};
use crate::orgkey;
use crate::sealing::PublicKey;

/// Who is being invited, and as what.
#[derive(Debug, Clone)]
pub struct Invitee {
    pub user_id: Uuid,
    pub email: String,
    pub public_key: PublicKey,
    pub role: MemberRole,
}

/// Creates and accepts invites.
pub struct InviteService {
    store: Arc<dyn Store>,
}

impl InviteService {
    /// Create a new invite service.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Create an invite, re-encrypting the org key for the invitee.
    ///
    /// The inviter proves access by opening their own org-key copy with
    /// their password. A wrong password fails before anything is
    /// written — no partial invite state exists.
    ///
    /// # Errors
    ///
    /// - [`InviteError::InvalidPassword`] if the inviter's password does
    ///   not open their copy.
    /// - [`InviteError::OrgKey`] if the copy is corrupt or was not
    ///   sealed to the inviter.
    /// - [`InviteError::Storage`] if persistence fails.
    pub async fn create_invite(
        &self,
        org_id: Uuid,
        inviter_record: &MemberKeyRecord,
        inviter_password: &str,
        inviter_copy: &[u8],
        invitee: Invitee,
    ) -> Result<InviteRecord, InviteError> {
        let org_key = match orgkey::decrypt_member_key(inviter_password, inviter_record, inviter_copy)
        {
            Ok(key) => key,
            Err(OrgKeyError::Key(KeyError::InvalidPassword)) => {
                return Err(InviteError::InvalidPassword)
            }
            Err(e) => return Err(e.into()),
        };

        let sealed_org_key =
            orgkey::grant_member_access(&org_key, &invitee.public_key).map_err(OrgKeyError::from)?;

        let record = InviteRecord {
            id: Uuid::new_v4(),
            org_id,
            role: invitee.role,
            invitee_email: invitee.email,
            invitee_user_id: invitee.user_id,
            sealed_org_key,
            invited_at: Utc::now(),
            accepted_at: None,
        };
        self.store.put_invite(record.clone()).await?;

        info!(
            %org_id,
            invite_id = %record.id,
            role = %record.role,
            "invite created"
        );

        Ok(record)
    }

    /// Accept an invite: install the precomputed sealed copy as the new
    /// member's org-key-copy row and mark the invite accepted.
    ///
    /// # Errors
    ///
    /// - [`InviteError::NotFound`] if the invite does not exist.
    /// - [`InviteError::AlreadyAccepted`] if it was accepted before.
    /// - [`InviteError::Storage`] if persistence fails.
    pub async fn accept_invite(&self, invite_id: Uuid) -> Result<(), InviteError> {
        let mut record = self
            .store
            .get_invite(invite_id)
            .await?
            .ok_or(InviteError::NotFound)?;

        if record.accepted_at.is_some() {
            return Err(InviteError::AlreadyAccepted);
        }

        self.store
            .put_org_key_copy(
                record.org_id,
                Principal::Member(record.invitee_user_id),
                record.sealed_org_key.clone(),
            )
            .await?;

        record.accepted_at = Some(Utc::now());
        let org_id = record.org_id;
        let user_id = record.invitee_user_id;
        self.store.put_invite(record).await?;

        info!(%org_id, %user_id, %invite_id, "invite accepted");

        Ok(())
    }
}

impl std::fmt::Debug for InviteService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InviteService").finish_non_exhaustive()
    }
}
