//! Batches validated against staged, uncommitted writes.

use trustlog_core::{MessageMeta, ObjectId, RevisionBuilder, WireMessage};
use trustlog_testkit::{Account, TestFixture, ACCOUNT};

#[test]
fn test_batch_cross_references_before_commit() {
    let fixture = TestFixture::new();
    let carol = fixture.signer("carol");
    let id = ObjectId::random();

    let first = RevisionBuilder::new(id, ACCOUNT)
        .allow_write(["carol"])
        .body(Account::new("carol", 1).to_body())
        .sign(&carol)
        .unwrap();
    let second = RevisionBuilder::new(id, ACCOUNT)
        .parent(first.header.version)
        .body(Account::new("carol", 2).to_body())
        .sign(&carol)
        .unwrap();

    // Nothing is staged: carol's key is unknown.
    assert!(!fixture.chain.validate_including_staging(&first));

    fixture.staging.stage_key(carol.public_key());
    fixture.staging.stage_data(first.clone());

    // Saved data alone does not resolve staged keys.
    assert!(!fixture.chain.validate(&WireMessage::Data(second.clone())));
    assert!(fixture.chain.validate_including_staging(&first));
    assert!(fixture.chain.validate_including_staging(&second));

    // Committed state is untouched by validation.
    assert!(!fixture.chain.ever_existed(&id));
    assert!(!fixture.chain.has_public_key(carol.hash()));
}

#[test]
fn test_validator_can_stage_a_whole_batch() {
    let fixture = TestFixture::new();
    let public = fixture.public_writer();
    let id = ObjectId::random();

    let mut batch = Vec::new();
    let mut builder = RevisionBuilder::new(id, ACCOUNT);
    for balance in 0..4 {
        let msg = builder.body(Account::new("p", balance).to_body()).sign(public).unwrap();
        builder = RevisionBuilder::new(id, ACCOUNT).parent(msg.header.version);
        batch.push(msg);
    }

    let mut validator = fixture.chain.create_trust_validator_including_staging();
    for msg in &batch {
        assert_eq!(validator.check(msg), Ok(()));
        validator.stage(msg.clone());
    }
    drop(validator);

    for msg in batch {
        assert!(fixture.chain.promote_chain_entry(msg, MessageMeta::local(0)));
    }
    assert_eq!(fixture.chain.get_history(&id).len(), 4);
}

#[test]
fn test_promotion_ignores_saved_data() {
    let fixture = TestFixture::new();
    let public = fixture.public_writer();
    let id = ObjectId::random();

    let saved = fixture.account(id, &Account::new("s", 1), public);
    let child = RevisionBuilder::new(id, ACCOUNT)
        .parent(saved.header.version)
        .body(Account::new("s", 2).to_body())
        .sign(public)
        .unwrap();
    fixture.staging.stage_data(saved);

    assert!(fixture.chain.validate(&WireMessage::Data(child.clone())));
    assert!(!fixture.chain.validate_without_saved_data(&child));
    assert!(!fixture.chain.promote_chain_entry(child, MessageMeta::local(0)));
    assert_eq!(fixture.listener.drop_reasons(), vec!["missing parent"]);
}
