//! End-to-end tests for the Node over both store backends.

use anyhow::Result;
use causeway::resolve::{BoxError, FoldFn, ReplayEvent};
use causeway::store::{MemoryStore, SqliteStore, Store};
use causeway::{
    Codec, ErrorKind, IngestResult, Iri, Node, NodeConfig, NodeError, OrphanPolicy, Version,
    VersionPolicy, Writer,
};
use causeway_testkit::{doc_iri, TestFixture};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn node() -> Node<MemoryStore> {
    init_tracing();
    Node::new(MemoryStore::new(), NodeConfig::default())
}

/// Signatures and authority checked at resolution instead of ingest.
fn deferred_node() -> Node<MemoryStore> {
    init_tracing();
    let config = NodeConfig {
        verify_signatures: false,
        ..NodeConfig::default()
    };
    Node::new(MemoryStore::new(), config)
}

fn buffering_node() -> Node<MemoryStore> {
    init_tracing();
    let config = NodeConfig {
        orphan_policy: OrphanPolicy::Buffer,
        ..NodeConfig::default()
    };
    Node::new(MemoryStore::new(), config)
}

fn concat() -> FoldFn<String, impl Fn(String, &ReplayEvent<'_>) -> Result<String, BoxError>> {
    FoldFn::new(|mut state: String, event: &ReplayEvent<'_>| {
        state.push_str(std::str::from_utf8(event.payload)?);
        Ok(state)
    })
}

async fn ingest_change<S: Store>(node: &Node<S>, change: &causeway::Change) -> Result<IngestResult> {
    Ok(node.ingest(change.to_bytes(), Codec::DagCbor).await?)
}

// ─────────────────────────────────────────────────────────────────────────────
// Versions
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_untrusted_head_masked_in_trusted_version() -> Result<()> {
    let node = node();
    let alice = TestFixture::with_seed([1; 32]);
    let bob = TestFixture::with_seed([2; 32]);

    let a = alice.root(1, b"A");
    let b = bob.change(2, &[a.cid()], b"B");
    ingest_change(&node, &a).await?;
    ingest_change(&node, &b).await?;
    node.set_trust(&alice.public_key(), true).await?;

    let timeline = node.get_entity_timeline(&alice.resource).await?;
    assert_eq!(timeline.public_version, Version::new([b.cid()]));
    assert_eq!(timeline.trusted_version, Version::new([a.cid()]));
    assert_eq!(timeline.owner, Some(alice.public_key()));

    let trusted = node
        .materialize_latest(&alice.resource, VersionPolicy::Trusted, &concat())
        .await?;
    assert_eq!(trusted.state, "A");
    let public = node
        .materialize_latest(&alice.resource, VersionPolicy::Public, &concat())
        .await?;
    assert_eq!(public.state, "AB");
    Ok(())
}

#[tokio::test]
async fn test_concurrent_heads_replay_in_clock_order() -> Result<()> {
    let node = node();
    let alice = TestFixture::with_seed([1; 32]);
    node.set_trust(&alice.public_key(), true).await?;

    let a = alice.root(1, b"A");
    let c2 = alice.change(3, &[a.cid()], b"2");
    let c1 = alice.change(2, &[a.cid()], b"1");
    for change in [&a, &c2, &c1] {
        ingest_change(&node, change).await?;
    }

    let timeline = node.get_entity_timeline(&alice.resource).await?;
    let heads = Version::new([c1.cid(), c2.cid()]);
    assert_eq!(timeline.public_version, heads);
    assert_eq!(timeline.trusted_version, heads);
    assert_eq!(timeline.public_version.to_string(), heads.to_string());

    let projection = node.materialize(&alice.resource, &heads, &concat()).await?;
    assert_eq!(projection.state, "A12");
    assert_eq!(projection.applied, vec![a.cid(), c1.cid(), c2.cid()]);
    Ok(())
}

#[tokio::test]
async fn test_timeline_of_unknown_entity_is_not_found() {
    let node = node();
    let err = node
        .get_entity_timeline(&doc_iri("nowhere"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ─────────────────────────────────────────────────────────────────────────────
// Ingest
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_ingest_is_idempotent() -> Result<()> {
    let node = node();
    let alice = TestFixture::with_seed([1; 32]);
    let a = alice.root(1, b"A");
    let b = alice.change(2, &[a.cid()], b"B");

    ingest_change(&node, &a).await?;
    ingest_change(&node, &b).await?;
    let before = node.get_entity_timeline(&alice.resource).await?;

    assert_eq!(ingest_change(&node, &b).await?, IngestResult::Duplicate(b.cid()));
    assert_eq!(ingest_change(&node, &a).await?, IngestResult::Duplicate(a.cid()));
    let after = node.get_entity_timeline(&alice.resource).await?;
    assert_eq!(before, after);
    Ok(())
}

#[tokio::test]
async fn test_missing_dependency_rejected_then_accepted() -> Result<()> {
    let node = node();
    let alice = TestFixture::with_seed([1; 32]);
    let a = alice.root(1, b"A");
    let b = alice.change(2, &[a.cid()], b"B");

    let err = node
        .ingest(b.to_bytes(), Codec::DagCbor)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReferentialGap);
    assert!(err.is_retryable());
    assert!(!node.has_blob(&b.cid()).await?);

    ingest_change(&node, &a).await?;
    assert_eq!(ingest_change(&node, &b).await?, IngestResult::Indexed(b.cid()));
    Ok(())
}

#[tokio::test]
async fn test_orphans_released_when_root_arrives() -> Result<()> {
    let node = buffering_node();
    let alice = TestFixture::with_seed([1; 32]);
    let a = alice.root(1, b"A");
    let b = alice.change(2, &[a.cid()], b"B");
    let c = alice.change(3, &[b.cid()], b"C");

    assert!(matches!(
        ingest_change(&node, &c).await?,
        IngestResult::Buffered { missing, .. } if missing == vec![b.cid()]
    ));
    assert!(matches!(
        ingest_change(&node, &b).await?,
        IngestResult::Buffered { .. }
    ));
    assert_eq!(node.buffered_orphans().await, 2);

    assert_eq!(ingest_change(&node, &a).await?, IngestResult::Indexed(a.cid()));
    assert_eq!(node.buffered_orphans().await, 0);

    let timeline = node.get_entity_timeline(&alice.resource).await?;
    assert_eq!(timeline.public_version, Version::new([c.cid()]));
    assert_eq!(timeline.changes_by_time, vec![a.cid(), b.cid(), c.cid()]);
    Ok(())
}

#[tokio::test]
async fn test_dependency_on_other_entity_rejected() -> Result<()> {
    let node = node();
    let alice = TestFixture::with_seed([1; 32]);
    let elsewhere = TestFixture {
        keypair: causeway::Keypair::from_seed(&[1; 32]),
        resource: doc_iri("elsewhere"),
    };
    let foreign = elsewhere.root(1, b"F");
    ingest_change(&node, &foreign).await?;

    let child = alice.change(2, &[foreign.cid()], b"X");
    let err = ingest_change(&node, &child).await.unwrap_err();
    let err = err.downcast::<causeway::NodeError>()?;
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(!node.has_blob(&child.cid()).await?);
    Ok(())
}

#[tokio::test]
async fn test_opaque_blobs_round_trip() -> Result<()> {
    let node = node();
    let cid = node.put_blob(&b"not cbor at all"[..], Codec::Raw).await?;
    assert_eq!(node.put_blob(&b"not cbor at all"[..], Codec::Raw).await?, cid);
    assert_eq!(node.get_blob(&cid).await?.as_ref(), b"not cbor at all");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Delegation
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_delegated_change_needs_its_proof() -> Result<()> {
    let node = node();
    let account = TestFixture::with_seed([1; 32]);
    let device = TestFixture::with_seed([2; 32]);
    let proof = account.delegate_to(device.public_key(), 5);
    let change = device.change_for(account.public_key(), proof.cid(), 10, &[], b"from device");

    let err = node
        .ingest(change.to_bytes(), Codec::DagCbor)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReferentialGap);

    assert_eq!(node.register_delegation(&proof).await?, proof.cid());
    assert_eq!(ingest_change(&node, &change).await?, IngestResult::Indexed(change.cid()));

    let summary = node.get_change(&change.cid()).await?;
    assert_eq!(summary.author, account.public_key());
    Ok(())
}

#[tokio::test]
async fn test_buffered_change_released_by_delegation() -> Result<()> {
    let node = buffering_node();
    let account = TestFixture::with_seed([1; 32]);
    let device = TestFixture::with_seed([2; 32]);
    let proof = account.delegate_to(device.public_key(), 5);
    let change = device.change_for(account.public_key(), proof.cid(), 10, &[], b"from device");

    assert!(matches!(
        ingest_change(&node, &change).await?,
        IngestResult::Buffered { missing, .. } if missing == vec![proof.cid()]
    ));
    node.ingest(proof.to_bytes(), Codec::DagCbor).await?;

    assert_eq!(node.buffered_orphans().await, 0);
    assert!(node.get_change(&change.cid()).await.is_ok());
    Ok(())
}

#[tokio::test]
async fn test_delegation_chain_authorizes_second_hop() -> Result<()> {
    let node = node();
    let account = TestFixture::with_seed([1; 32]);
    let laptop = TestFixture::with_seed([2; 32]);
    let phone = TestFixture::with_seed([3; 32]);

    node.delegate(&account.keypair, laptop.public_key()).await?;
    let second = node.delegate(&laptop.keypair, phone.public_key()).await?;

    let writer = Writer::delegated(account.public_key(), phone.keypair.clone(), second);
    let cid = node
        .create_change(&writer, &account.resource, &b"hop"[..], None)
        .await?;
    assert_eq!(node.get_change(&cid).await?.author, account.public_key());
    Ok(())
}

#[tokio::test]
async fn test_signer_without_delegation_rejected() -> Result<()> {
    let node = node();
    let account = TestFixture::with_seed([1; 32]);
    let stranger = TestFixture::with_seed([9; 32]);
    let forged = causeway::ChangeBuilder::new(account.public_key(), account.resource.clone())
        .hlc(causeway::HlcTimestamp::new(1, 0))
        .sign(&stranger.keypair);

    let err = node
        .ingest(forged.to_bytes(), Codec::DagCbor)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SignatureInvalid);
    assert!(!node.has_blob(&forged.cid()).await?);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Local Writes
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_writer_builds_on_remote_heads() -> Result<()> {
    let node = node();
    let remote = TestFixture::with_seed([2; 32]);
    let root = remote.root(1, b"A");
    ingest_change(&node, &root).await?;

    let writer = Writer::new(causeway::Keypair::from_seed(&[1; 32]));
    let first = node
        .create_change(&writer, &remote.resource, &b"B"[..], None)
        .await?;
    assert_eq!(node.get_change(&first).await?.deps, vec![root.cid()]);

    // A concurrent remote change does not move the writer's named version.
    let side = remote.change(2, &[root.cid()], b"S");
    ingest_change(&node, &side).await?;
    let second = node
        .create_change(&writer, &remote.resource, &b"C"[..], None)
        .await?;
    assert_eq!(node.get_change(&second).await?.deps, vec![first]);

    let timeline = node.get_entity_timeline(&remote.resource).await?;
    assert_eq!(timeline.public_version, Version::new([second, side.cid()]));
    Ok(())
}

#[tokio::test]
async fn test_device_keeps_a_pointer_per_account() -> Result<()> {
    let node = node();
    let device = TestFixture::with_seed([2; 32]);
    let bob = TestFixture::with_seed([3; 32]);
    let doc = doc_iri("shared");

    let own = Writer::new(device.keypair.clone());
    let proof = node.delegate(&bob.keypair, device.public_key()).await?;
    let for_bob = Writer::delegated(bob.public_key(), device.keypair.clone(), proof);

    let c1 = node.create_change(&own, &doc, &b"1"[..], None).await?;
    let c2 = node.create_change(&for_bob, &doc, &b"2"[..], None).await?;
    assert_eq!(node.get_change(&c2).await?.deps, vec![c1]);

    // Writing for bob did not move the device's own pointer.
    let c3 = node.create_change(&own, &doc, &b"3"[..], None).await?;
    assert_eq!(node.get_change(&c3).await?.deps, vec![c1]);

    let signer = device.public_key();
    assert_eq!(
        node.named_version(&doc, "main", &bob.public_key(), &signer).await?,
        Some(Version::new([c2]))
    );
    assert_eq!(
        node.named_version(&doc, "main", &signer, &signer).await?,
        Some(Version::new([c3]))
    );
    Ok(())
}

#[tokio::test]
async fn test_concurrent_local_writes_form_a_chain() -> Result<()> {
    let node = std::sync::Arc::new(node());
    let writer = Writer::new(causeway::Keypair::from_seed(&[1; 32]));
    let doc = doc_iri("chain");

    let mut tasks = Vec::new();
    for i in 0..8u8 {
        let node = node.clone();
        let writer = writer.clone();
        let doc = doc.clone();
        tasks.push(tokio::spawn(async move {
            node.create_change(&writer, &doc, vec![i], None).await
        }));
    }
    for task in tasks {
        task.await??;
    }

    let timeline = node.get_entity_timeline(&doc).await?;
    assert_eq!(timeline.changes.len(), 8);
    assert_eq!(timeline.public_version.len(), 1);
    assert_eq!(timeline.roots.len(), 1);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Verification, Deletion, Listing
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_verify_entity_quarantines_unauthorized_branch() -> Result<()> {
    let node = deferred_node();
    let alice = TestFixture::with_seed([1; 32]);
    let mallory = TestFixture::with_seed([6; 32]);

    let a = alice.root(1, b"A");
    let forged = causeway::ChangeBuilder::new(alice.public_key(), alice.resource.clone())
        .hlc(causeway::HlcTimestamp::new(2, 0))
        .dep(a.cid())
        .payload(b"forged".to_vec())
        .sign(&mallory.keypair);
    let after = alice.change(3, &[forged.cid()], b"C");
    for change in [&a, &forged, &after] {
        ingest_change(&node, change).await?;
    }

    let timeline = node.verify_entity(&alice.resource).await?;
    assert_eq!(timeline.public_version, Version::new([a.cid()]));
    assert!(timeline.quarantined.contains(&forged.cid()));
    assert!(timeline.quarantined.contains(&after.cid()));
    assert_eq!(timeline.changes.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_deferred_verification_keeps_forgery_out_of_trusted_version() -> Result<()> {
    let node = deferred_node();
    let alice = TestFixture::with_seed([1; 32]);
    let mallory = TestFixture::with_seed([6; 32]);
    node.set_trust(&alice.public_key(), true).await?;

    let a = alice.root(1, b"A");
    let forged = causeway::ChangeBuilder::new(alice.public_key(), alice.resource.clone())
        .hlc(causeway::HlcTimestamp::new(2, 0))
        .dep(a.cid())
        .payload(b"forged".to_vec())
        .sign(&mallory.keypair);
    ingest_change(&node, &a).await?;
    assert_eq!(
        ingest_change(&node, &forged).await?,
        IngestResult::Indexed(forged.cid())
    );

    let timeline = node.get_entity_timeline(&alice.resource).await?;
    assert_eq!(timeline.trusted_version, Version::new([a.cid()]));
    assert_eq!(timeline.public_version, Version::new([a.cid()]));
    assert!(timeline.quarantined.contains(&forged.cid()));

    let trusted = node
        .materialize_latest(&alice.resource, VersionPolicy::Trusted, &concat())
        .await?;
    assert_eq!(trusted.state, "A");

    let err = node
        .materialize(&alice.resource, &Version::new([forged.cid()]), &concat())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SignatureInvalid);
    assert!(matches!(err, NodeError::Quarantined { cid, .. } if cid == forged.cid()));

    // Local writes build on the verified heads only.
    let writer = Writer::new(alice.keypair.clone());
    let next = node
        .create_change(&writer, &alice.resource, &b"B"[..], None)
        .await?;
    assert_eq!(node.get_change(&next).await?.deps, vec![a.cid()]);
    Ok(())
}

#[tokio::test]
async fn test_delete_entity_leaves_tombstone() -> Result<()> {
    let node = node();
    let alice = TestFixture::with_seed([1; 32]);
    let a = alice.root(1, b"A");
    ingest_change(&node, &a).await?;

    assert!(node.delete_entity(&alice.resource, "spam", Some("Notes")).await?);
    assert!(!node.delete_entity(&alice.resource, "spam", Some("Notes")).await?);
    assert_eq!(
        node.get_change(&a.cid()).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert!(node.list_entities("hm://d/").await?.is_empty());

    // Neither a peer nor a local writer can bring it back.
    let err = ingest_change(&node, &a).await.unwrap_err();
    let err = err.downcast::<NodeError>()?;
    assert!(matches!(&err, NodeError::EntityDeleted(iri) if iri == &alice.resource));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!node.has_blob(&a.cid()).await?);
    let writer = Writer::new(alice.keypair.clone());
    assert!(matches!(
        node.create_change(&writer, &alice.resource, &b"B"[..], None).await,
        Err(NodeError::EntityDeleted(_))
    ));

    let deleted = node.list_deleted_entities().await?;
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].iri, alice.resource);
    assert_eq!(deleted[0].reason, "spam");
    assert_eq!(deleted[0].meta.as_deref(), Some("Notes"));

    assert!(node.undelete_entity(&alice.resource).await?);
    assert!(!node.undelete_entity(&alice.resource).await?);
    assert!(node.list_deleted_entities().await?.is_empty());
    assert_eq!(ingest_change(&node, &a).await?, IngestResult::Indexed(a.cid()));
    Ok(())
}

#[tokio::test]
async fn test_sqlite_tombstone_survives_reopen() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("causeway.db");
    let alice = TestFixture::with_seed([1; 32]);
    let a = alice.root(1, b"A");

    {
        let node = Node::new(SqliteStore::open(&path)?, NodeConfig::default());
        ingest_change(&node, &a).await?;
        node.delete_entity(&alice.resource, "moved", None).await?;
    }

    let node = Node::new(SqliteStore::open(&path)?, NodeConfig::default());
    assert_eq!(node.list_deleted_entities().await?[0].iri, alice.resource);
    let err = node.ingest(a.to_bytes(), Codec::DagCbor).await.unwrap_err();
    assert!(matches!(err, NodeError::EntityDeleted(_)));
    Ok(())
}

#[tokio::test]
async fn test_list_entities_by_prefix() -> Result<()> {
    let node = node();
    let writer = Writer::new(causeway::Keypair::from_seed(&[1; 32]));
    for name in ["hm://d/notes/a", "hm://d/notes/b", "hm://d/other"] {
        let iri = Iri::parse(name)?;
        node.create_change(&writer, &iri, &b"x"[..], None).await?;
    }

    let notes = node.list_entities("hm://d/notes/").await?;
    assert_eq!(notes.len(), 2);
    assert!(notes.iter().all(|iri| iri.as_str().starts_with("hm://d/notes/")));
    Ok(())
}

#[tokio::test]
async fn test_trust_registry() -> Result<()> {
    let node = node();
    let alice = TestFixture::with_seed([1; 32]);

    assert!(node.set_trust(&alice.public_key(), true).await?);
    assert!(!node.set_trust(&alice.public_key(), true).await?);
    assert!(node.is_trusted(&alice.public_key()).await?);
    assert_eq!(node.list_trusted().await?, vec![alice.public_key()]);

    assert!(node.set_trust(&alice.public_key(), false).await?);
    assert!(node.list_trusted().await?.is_empty());
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// SQLite
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_sqlite_node_survives_reopen() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("causeway.db");
    let alice = TestFixture::with_seed([1; 32]);
    let config = NodeConfig::from_json(r#"{"default_namespace": "drafts"}"#)?;

    let (before, named) = {
        let node = Node::new(SqliteStore::open(&path)?, config.clone());
        let writer = Writer::new(alice.keypair.clone());
        node.create_change(&writer, &alice.resource, &b"A"[..], None)
            .await?;
        let head = node
            .create_change(&writer, &alice.resource, &b"B"[..], Some("title"))
            .await?;
        node.set_trust(&alice.public_key(), true).await?;
        (node.get_entity_timeline(&alice.resource).await?, head)
    };

    let node = Node::new(SqliteStore::open(&path)?, config);
    let after = node.get_entity_timeline(&alice.resource).await?;
    assert_eq!(before, after);
    assert_eq!(after.trusted_version, Version::new([named]));
    assert_eq!(
        node.named_version(
            &alice.resource,
            "drafts",
            &alice.public_key(),
            &alice.public_key()
        )
        .await?,
        Some(Version::new([named]))
    );
    assert_eq!(node.load_change(&named).await?.hint.as_deref(), Some("title"));
    Ok(())
}
