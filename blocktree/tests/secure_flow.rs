//! End-to-end tests for the secure layer: root installation, the signed
//! mutation envelope, authorization walks, key rotation, and trusted
//! reads through the secrets broker.
//!
//! The cast: a root write key (the trust anchor), a root-zone write key
//! (day-to-day administration), and per-test member keys.

use std::sync::Arc;

use blocktree::{
    BlockHash, BlockType, Blockchain, Blocktree, BlocktreeError, CryptoProvider, KeyAction,
    KeyEntry, KeySet, Keypair, KeypairSigner, MemoryBroker, MemoryCache, MemoryStore,
    MockTimeSource, OptionsRecord, RootInstallation, SecureBlocktree, StandardCrypto,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

struct Setup {
    secure: SecureBlocktree,
    crypto: Arc<dyn CryptoProvider>,
    time: Arc<MockTimeSource>,
    root_write: Keypair,
    zone_write: Keypair,
}

fn setup() -> Setup {
    let crypto: Arc<dyn CryptoProvider> = Arc::new(StandardCrypto::new());
    let time = Arc::new(MockTimeSource::default());
    let chain = Blockchain::new(
        Arc::new(MemoryStore::new(Arc::clone(&crypto))),
        Arc::new(MemoryCache::new()),
        Arc::clone(&time) as Arc<dyn blocktree::TimeSource>,
        Arc::clone(&crypto),
    );
    Setup {
        secure: SecureBlocktree::new(Blocktree::new(chain)),
        crypto,
        time,
        root_write: Keypair::generate(),
        zone_write: Keypair::generate(),
    }
}

impl Setup {
    fn signer(&self, keypair: &Keypair) -> KeypairSigner {
        KeypairSigner::new(keypair.clone(), Arc::clone(&self.crypto))
    }

    /// Install the root with write grants for the fixture keys.
    async fn install(&self) -> RootInstallation {
        let mut root_keys = KeySet::new();
        root_keys.grant_forever(KeyAction::Write, self.root_write.public_key());
        let mut zone_keys = KeySet::new();
        zone_keys.grant_forever(KeyAction::Write, self.zone_write.public_key());

        self.secure
            .install_root(root_keys, zone_keys, &self.signer(&self.root_write))
            .await
            .expect("root install should succeed on an empty store")
    }
}

// ---------------------------------------------------------------------------
// 1. Root installation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn exactly_one_root_per_store() {
    let s = setup();
    s.install().await;

    let mut keys = KeySet::new();
    keys.grant_forever(KeyAction::Write, s.root_write.public_key());
    let err = s
        .secure
        .install_root(keys.clone(), keys, &s.signer(&s.root_write))
        .await
        .unwrap_err();
    assert!(matches!(err, BlocktreeError::InvalidRoot { .. }));
}

#[tokio::test]
async fn installed_blocks_verify_and_trace() {
    let s = setup();
    let installed = s.install().await;

    for hash in [installed.root, installed.root_zone, installed.root_zone_keys] {
        s.secure.validate_signature(&hash).await.unwrap();
        assert!(s.secure.perform_signature_trace(&hash).await.is_ok());
    }
}

// ---------------------------------------------------------------------------
// 2. The S6 shape: who may rename a zone
// ---------------------------------------------------------------------------

#[tokio::test]
async fn zone_rename_authority() {
    let s = setup();
    let installed = s.install().await;

    // Zone Z under the root zone, created by the root-zone write key.
    let z = s
        .secure
        .create_zone(
            &installed.root_zone,
            &s.signer(&s.zone_write),
            OptionsRecord::new().with("name", "Z"),
        )
        .await
        .unwrap();

    // Renamed by the root-zone write key: allowed.
    s.secure
        .set_options(
            &z,
            &s.signer(&s.zone_write),
            OptionsRecord::new().with("name", "NEW NAME"),
        )
        .await
        .unwrap();

    // Renamed by the root write key: allowed (found higher on the walk).
    s.secure
        .set_options(
            &z,
            &s.signer(&s.root_write),
            OptionsRecord::new().with("name", "NEWER NAME"),
        )
        .await
        .unwrap();

    // Z's own key, installed via set_keys, governs Z's children, not Z.
    let z_own = Keypair::generate();
    let mut z_keys = KeySet::new();
    z_keys.grant_forever(KeyAction::Write, z_own.public_key());
    s.secure
        .set_keys(&z, &s.signer(&s.zone_write), z_keys)
        .await
        .unwrap();

    let err = s
        .secure
        .set_options(
            &z,
            &s.signer(&z_own),
            OptionsRecord::new().with("name", "DENIED"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BlocktreeError::InvalidSignature { .. }));
}

// ---------------------------------------------------------------------------
// 3. Authorization walks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn keys_absent_from_every_ancestor_are_unauthorized() {
    let s = setup();
    let installed = s.install().await;
    let outsider = Keypair::generate();

    let err = s
        .secure
        .create_zone(
            &installed.root_zone,
            &s.signer(&outsider),
            OptionsRecord::new(),
        )
        .await
        .unwrap_err();
    match err {
        BlocktreeError::InvalidSignature { reason, .. } => {
            assert_eq!(
                reason,
                blocktree::error::InvalidSignatureReason::Unauthorized
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn authority_delegates_down_a_deep_hierarchy() {
    let s = setup();
    let installed = s.install().await;

    // zone -> identity -> collection -> record, each level created by the
    // authority one level up.
    let zone = s
        .secure
        .create_zone(
            &installed.root_zone,
            &s.signer(&s.zone_write),
            OptionsRecord::new().with("name", "engineering"),
        )
        .await
        .unwrap();

    let identity = s
        .secure
        .create_identity(
            &zone,
            &s.signer(&s.zone_write),
            OptionsRecord::new().with("name", "alice"),
        )
        .await
        .unwrap();

    let collection = s
        .secure
        .create_collection(
            &identity,
            &s.signer(&s.zone_write),
            OptionsRecord::new().with("name", "notes"),
        )
        .await
        .unwrap();

    let record = s
        .secure
        .add_record(
            &collection,
            &s.signer(&s.zone_write),
            b"first note".to_vec(),
        )
        .await
        .unwrap();

    // The tree layer sees the same structure.
    let scan = s
        .secure
        .tree()
        .perform_parent_scan(&collection)
        .await
        .unwrap();
    let path: Vec<BlockHash> = scan.iter().map(|b| b.hash).collect();
    assert_eq!(
        path,
        vec![collection, identity, zone, installed.root_zone, installed.root]
    );

    let block = s.secure.read_secure_block(&record).await.unwrap().unwrap();
    assert_eq!(block.block_type, BlockType::Record);
    assert_eq!(block.record(), Some(b"first note".as_slice()));

    // The record's trace runs from the identity level up to the root-zone
    // key set that covers the signer.
    let trace = s.secure.perform_signature_trace(&record).await.unwrap();
    assert_eq!(trace.last().unwrap().hash, installed.root_zone_keys);
}

#[tokio::test]
async fn expired_windows_are_rejected() {
    let s = setup();
    let installed = s.install().await;

    // A member whose write authority lives in a finite window.
    let member = Keypair::generate();
    let mut keys = KeySet::new();
    keys.grant_forever(KeyAction::Write, s.zone_write.public_key());
    keys.insert(
        KeyAction::Write,
        KeyEntry::windowed(member.public_key(), 0, 2_000_000),
    );
    s.secure
        .set_keys(&installed.root_zone, &s.signer(&s.root_write), keys)
        .await
        .unwrap();

    // Inside the window: accepted.
    let zone = s
        .secure
        .create_zone(&installed.root_zone, &s.signer(&member), OptionsRecord::new())
        .await
        .unwrap();
    assert!(s.secure.read_secure_block(&zone).await.unwrap().is_some());

    // Push the clock past the window: rejected as expired.
    s.time.set_next_timestamp(3_000_000);
    let err = s
        .secure
        .create_zone(&installed.root_zone, &s.signer(&member), OptionsRecord::new())
        .await
        .unwrap_err();
    match err {
        BlocktreeError::InvalidKey { reason, .. } => {
            assert_eq!(reason, blocktree::error::InvalidKeyReason::Expired);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// 4. Key rotation and revocation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rotation_replaces_effective_authority() {
    let s = setup();
    let installed = s.install().await;

    let new_admin = Keypair::generate();
    let mut rotated = KeySet::new();
    rotated.grant_forever(KeyAction::Write, new_admin.public_key());

    // Root rotates the root zone's key set wholesale.
    s.secure
        .set_keys(&installed.root_zone, &s.signer(&s.root_write), rotated)
        .await
        .unwrap();

    // The new key works; the old one is no longer in the effective set.
    s.secure
        .create_zone(
            &installed.root_zone,
            &s.signer(&new_admin),
            OptionsRecord::new(),
        )
        .await
        .unwrap();
    let err = s
        .secure
        .create_zone(
            &installed.root_zone,
            &s.signer(&s.zone_write),
            OptionsRecord::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BlocktreeError::InvalidSignature { .. }));
}

#[tokio::test]
async fn revocation_preserves_history() {
    let s = setup();
    let installed = s.install().await;

    let zone = s
        .secure
        .create_zone(
            &installed.root_zone,
            &s.signer(&s.zone_write),
            OptionsRecord::new().with("name", "pre-revocation"),
        )
        .await
        .unwrap();

    s.secure
        .revoke_keys(
            &installed.root_zone,
            &s.signer(&s.root_write),
            &[s.zone_write.public_key()],
        )
        .await
        .unwrap();

    // History written before the revocation still verifies and traces.
    s.secure.validate_signature(&zone).await.unwrap();
    assert!(s.secure.perform_signature_trace(&zone).await.is_ok());

    // New writes with the revoked key do not.
    assert!(s
        .secure
        .create_zone(
            &installed.root_zone,
            &s.signer(&s.zone_write),
            OptionsRecord::new()
        )
        .await
        .is_err());
}

// ---------------------------------------------------------------------------
// 5. Trusted reads through the broker
// ---------------------------------------------------------------------------

#[tokio::test]
async fn read_secret_reencrypts_for_the_trusted_key() {
    let s = setup();
    let broker = MemoryBroker::new(Arc::clone(&s.crypto), Arc::clone(&s.time) as _);

    // The root zone's read key is escrowed with the broker at install.
    let zone_read = Keypair::generate();
    let escrowed = broker.escrow(&zone_read.secret_key_bytes()).unwrap();

    let mut root_keys = KeySet::new();
    root_keys.grant_forever(KeyAction::Write, s.root_write.public_key());
    let mut zone_keys = KeySet::new();
    zone_keys.grant_forever(KeyAction::Write, s.zone_write.public_key());
    zone_keys.insert(
        KeyAction::Read,
        KeyEntry::forever(zone_read.public_key()).with_secret(escrowed),
    );
    let installed = s
        .secure
        .install_root(root_keys, zone_keys, &s.signer(&s.root_write))
        .await
        .unwrap();

    let zone = s
        .secure
        .create_zone(
            &installed.root_zone,
            &s.signer(&s.zone_write),
            OptionsRecord::new(),
        )
        .await
        .unwrap();

    // A trusted reader asks for the zone's secrets.
    let reader = Keypair::generate();
    let payloads = s
        .secure
        .read_secret(&zone, &reader.public_key(), &broker)
        .await
        .unwrap();
    assert_eq!(payloads.len(), 1);

    // Only the reader's key opens the re-encrypted payload, and it
    // contains the escrowed read key.
    let recovered = s.crypto.decrypt(&reader, &payloads[0]).unwrap();
    assert_eq!(recovered, zone_read.secret_key_bytes());

    // A block with no escrowed secrets along its path reports NotFound.
    let err = s
        .secure
        .read_secret(&installed.root, &reader.public_key(), &broker)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BlocktreeError::InvalidKey {
            reason: blocktree::error::InvalidKeyReason::NotFound,
            ..
        }
    ));
}

// ---------------------------------------------------------------------------
// 6. Tamper evidence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn secure_reads_reject_layer2_blocks() {
    let s = setup();
    s.install().await;

    // A plain tree block is not a secure block, and reading it through
    // the secure layer must say so rather than guess.
    let plain = s
        .secure
        .tree()
        .write_block(
            blocktree::TreeBlockData {
                prev: None,
                parent: None,
                data: b"not secure".to_vec(),
                layer: None,
            },
            blocktree::WriteOptions::default(),
        )
        .await
        .unwrap();

    let err = s.secure.read_secure_block(&plain).await.unwrap_err();
    assert!(matches!(err, BlocktreeError::Serialization { .. }));
}
