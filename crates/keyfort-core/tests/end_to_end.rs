//! End-to-end flow over the in-memory store: signup, org provisioning,
//! secret writes and reads, member invites, and headless token access.

#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use keyfort_core::config::ServerKeyPair;
use keyfort_core::invite::{InviteService, Invitee};
use keyfort_core::keypair::KeyPairService;
use keyfort_core::orgkey::{self, OrgKeyService};
use keyfort_core::payload::{self, Payload};
use keyfort_core::snapshot::SnapshotService;
use keyfort_core::token::TokenService;
use keyfort_storage::{MemberRole, MemoryStore, Store};
use uuid::Uuid;

struct Platform {
    keypairs: KeyPairService,
    org_keys: OrgKeyService,
    snapshots: SnapshotService,
    tokens: TokenService,
    invites: InviteService,
}

impl Platform {
    fn new() -> Self {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        Self {
            keypairs: KeyPairService::new(Arc::clone(&store)),
            org_keys: OrgKeyService::new(Arc::clone(&store), ServerKeyPair::generate()),
            snapshots: SnapshotService::new(Arc::clone(&store)),
            tokens: TokenService::new(Arc::clone(&store)),
            invites: InviteService::new(store),
        }
    }
}

#[tokio::test]
async fn signup_to_secret_readback() {
    let platform = Platform::new();
    let alice = Uuid::new_v4();
    let org = Uuid::new_v4();
    let env = Uuid::new_v4();

    // Alice signs up and creates an organization.
    let alice_pair = platform.keypairs.register(alice, "alice-pw").await.unwrap();
    let org_key = platform
        .org_keys
        .provision_org(org, alice, &alice_pair.public_key)
        .await
        .unwrap();

    // She stores two secrets in one version.
    let mut entries = BTreeMap::new();
    entries.insert(
        "DATABASE_URL".to_owned(),
        Payload::new("postgres://prod", false).encrypt(&org_key).unwrap(),
    );
    entries.insert(
        "PUBLIC_ORIGIN".to_owned(),
        Payload::new("https://app.example.com", true).encrypt(&org_key).unwrap(),
    );
    let version = platform.snapshots.set_many(env, entries).await.unwrap();
    assert_eq!(version, 1);

    // An interactive session recovers the org key through the member
    // path and reads a secret back.
    let record = platform.keypairs.record(alice).await.unwrap();
    let copy = platform.org_keys.member_copy(org, alice).await.unwrap();
    let session_key = orgkey::decrypt_member_key("alice-pw", &record, &copy).unwrap();

    let stored = platform.snapshots.get(env, "DATABASE_URL", None).await.unwrap();
    let plain = stored.decrypt(&session_key).unwrap().decode().unwrap();
    assert_eq!(plain.value(), "postgres://prod");
}

#[tokio::test]
async fn invited_member_reads_existing_secrets() {
    let platform = Platform::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let org = Uuid::new_v4();
    let env = Uuid::new_v4();

    let alice_pair = platform.keypairs.register(alice, "alice-pw").await.unwrap();
    let bob_pair = platform.keypairs.register(bob, "bob-pw").await.unwrap();
    let org_key = platform
        .org_keys
        .provision_org(org, alice, &alice_pair.public_key)
        .await
        .unwrap();

    platform
        .snapshots
        .set(env, "API_KEY", Payload::new("sk-123", false).encrypt(&org_key).unwrap())
        .await
        .unwrap();

    // Alice invites Bob; Bob accepts.
    let alice_record = platform.keypairs.record(alice).await.unwrap();
    let alice_copy = platform.org_keys.member_copy(org, alice).await.unwrap();
    let invite = platform
        .invites
        .create_invite(
            org,
            &alice_record,
            "alice-pw",
            &alice_copy,
            Invitee {
                user_id: bob,
                email: "bob@example.com".to_owned(),
                public_key: bob_pair.public_key,
                role: MemberRole::Developer,
            },
        )
        .await
        .unwrap();
    platform.invites.accept_invite(invite.id).await.unwrap();

    // Bob reads the secret that predates his membership.
    let bob_record = platform.keypairs.record(bob).await.unwrap();
    let bob_copy = platform.org_keys.member_copy(org, bob).await.unwrap();
    let bob_key = orgkey::decrypt_member_key("bob-pw", &bob_record, &bob_copy).unwrap();

    let stored = platform.snapshots.get(env, "API_KEY", None).await.unwrap();
    let plain = stored.decrypt(&bob_key).unwrap().decode().unwrap();
    assert_eq!(plain.value(), "sk-123");
}

#[tokio::test]
async fn headless_token_reads_whole_environment() {
    let platform = Platform::new();
    let alice = Uuid::new_v4();
    let org = Uuid::new_v4();
    let env = Uuid::new_v4();

    let alice_pair = platform.keypairs.register(alice, "alice-pw").await.unwrap();
    platform
        .org_keys
        .provision_org(org, alice, &alice_pair.public_key)
        .await
        .unwrap();

    // The server side uses its own org-key copy to seal secrets and
    // mint a CI token — no user password anywhere in this flow.
    let server_key = platform.org_keys.get_server_org_key(org).await.unwrap();
    let mut entries = BTreeMap::new();
    entries.insert(
        "DEPLOY_HOOK".to_owned(),
        Payload::new("https://hooks/1", false).encrypt(&server_key).unwrap(),
    );
    entries.insert(
        "REGISTRY_TOKEN".to_owned(),
        Payload::new("ghcr-abc", false).encrypt(&server_key).unwrap(),
    );
    platform.snapshots.set_many(env, entries).await.unwrap();

    let token = platform
        .tokens
        .issue(&server_key, org, env, Utc::now() + Duration::days(30), "ci-deploy")
        .await
        .unwrap();

    // Later, a CI job presents the token and decrypts the environment.
    let (ci_key, bound_env) = platform.tokens.validate(&token, org).await.unwrap();
    assert_eq!(bound_env, env);

    let listing = platform.snapshots.list(bound_env, None).await.unwrap();
    let mut all = BTreeMap::new();
    for item in listing {
        let value = platform
            .snapshots
            .get(bound_env, &item.key, None)
            .await
            .unwrap();
        all.insert(item.key, value);
    }
    let decrypted = payload::decrypt_map(all, &ci_key).unwrap();
    assert_eq!(
        decrypted["DEPLOY_HOOK"].clone().decode().unwrap().value(),
        "https://hooks/1"
    );
    assert_eq!(
        decrypted["REGISTRY_TOKEN"].clone().decode().unwrap().value(),
        "ghcr-abc"
    );
}
