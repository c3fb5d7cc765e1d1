//! Both settings of extra validation.

use trustlog_core::{CastleId, MessageType, ObjectId, PublicKeyMessage, RevisionBuilder, SecurityCastle};
use trustlog_forge::{PrivateKey, PublicKey};
use trustlog_testkit::TestFixture;

fn untyped_revision(fixture: &TestFixture) -> trustlog_core::DataMessage {
    RevisionBuilder::new(ObjectId::random(), "")
        .body(b"x".to_vec())
        .sign(fixture.public_writer())
        .unwrap()
}

#[tokio::test]
async fn test_strict_drops_structural_errors() {
    let fixture = TestFixture::new();
    assert!(fixture.chain.config().extra_validation);

    let msg = untyped_revision(&fixture);
    let id = msg.id();
    assert!(!fixture.submit(msg).await);
    assert!(!fixture.chain.ever_existed(&id));
    assert_eq!(fixture.listener.drop_reasons(), vec!["missing payload type"]);
}

#[tokio::test]
async fn test_lenient_defers_to_trust_validation() {
    let fixture = TestFixture::lenient();
    assert!(!fixture.chain.config().extra_validation);

    // Structurally odd but properly signed: accepted.
    let msg = untyped_revision(&fixture);
    let id = msg.id();
    assert!(fixture.submit(msg).await);
    assert!(fixture.chain.exists(&id));
    assert_eq!(fixture.chain.get_all_data(Some("")).len(), 1);

    // Unsigned: still refused.
    let anchor = RevisionBuilder::new(ObjectId::random(), "Account").build_header_only();
    assert!(!fixture.submit(anchor).await);
    assert_eq!(fixture.listener.drop_reasons(), vec!["missing header or digest"]);
}

#[tokio::test]
async fn test_tampered_signature_dropped_in_both_modes() {
    for fixture in [TestFixture::new(), TestFixture::lenient()] {
        let mut msg = RevisionBuilder::new(ObjectId::random(), "Account")
            .body(b"honest".to_vec())
            .sign(fixture.public_writer())
            .unwrap();
        msg.body = Some(bytes::Bytes::from_static(b"forged"));

        assert!(!fixture.submit(msg).await);
        assert_eq!(fixture.listener.drop_reasons(), vec!["invalid signature"]);
    }
}

#[tokio::test]
async fn test_key_hash_checked_only_when_strict() {
    let strict = TestFixture::new();
    let lenient = TestFixture::lenient();
    let key = strict.signer("eve");
    let forged = PublicKey::from_parts(key.public_key().bytes().to_vec(), "forged-hash".into(), None);

    assert!(!strict.submit(PublicKeyMessage::from_key(&forged)).await);
    assert!(!strict.chain.has_public_key("forged-hash"));
    assert_eq!(strict.listener.drops()[0].message_type, Some(MessageType::PublicKey));

    // Lenient takes the key, but only under the hash of its bytes.
    assert!(lenient.submit(PublicKeyMessage::from_key(&forged)).await);
    assert!(!lenient.chain.has_public_key("forged-hash"));
    assert!(lenient.chain.has_public_key(key.hash()));
}

#[tokio::test]
async fn test_lenient_key_cannot_take_over_anchor_hash() {
    let fixture = TestFixture::lenient();
    let public = fixture.public_writer();
    let attacker = fixture.signer("attacker");
    let forged = PublicKey::from_parts(attacker.public_key().bytes().to_vec(), public.hash().to_string(), None);
    assert!(fixture.submit(PublicKeyMessage::from_key(&forged)).await);

    // The anchor's entry is untouched and still writes.
    assert_eq!(fixture.chain.get_public_key(public.hash()), Some(public.public_key().clone()));
    let legit = RevisionBuilder::new(ObjectId::random(), "Account")
        .body(b"legit".to_vec())
        .sign(public)
        .unwrap();
    assert!(fixture.submit(legit).await);

    // The attacker's signature does not pass as the anchor's.
    let posing = PrivateKey::new(forged, attacker.private_bytes().to_vec());
    let impersonation = RevisionBuilder::new(ObjectId::random(), "Account")
        .body(b"evil".to_vec())
        .sign(&posing)
        .unwrap();
    assert_eq!(impersonation.header.signing_key_hash.as_deref(), Some(public.hash()));
    let id = impersonation.id();
    assert!(!fixture.submit(impersonation).await);
    assert!(!fixture.chain.ever_existed(&id));
    assert_eq!(fixture.listener.drop_reasons(), vec!["invalid signature"]);
}

#[tokio::test]
async fn test_empty_castle_checked_only_when_strict() {
    let empty = || SecurityCastle {
        id: Some(CastleId::random()),
        lookup: Default::default(),
    };

    let strict = TestFixture::new();
    assert!(!strict.submit(empty()).await);
    assert_eq!(strict.listener.drop_reasons(), vec!["castle has no holders"]);

    let lenient = TestFixture::lenient();
    assert!(lenient.submit(empty()).await);

    // A castle without an id is refused either way.
    let anonymous = SecurityCastle {
        id: None,
        lookup: Default::default(),
    };
    assert!(!lenient.submit(anonymous).await);
    assert_eq!(lenient.listener.drop_reasons(), vec!["missing id"]);
}
