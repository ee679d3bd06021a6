use domain::{CredentialType, PracticeContext};
use reception_credential::{
    CredentialError, CredentialResolver, IdentifierCipher, IssueCredential, LookupHasher,
    Resolution,
};
use reception_storage::{
    CredentialStore, InMemoryCredentialStore, InMemoryPatientDirectory, PatientRecord,
};
use std::sync::Arc;

struct Fixture {
    store: Arc<InMemoryCredentialStore>,
    resolver: CredentialResolver,
}

fn fixture() -> Fixture {
    let store = Arc::new(InMemoryCredentialStore::new());
    let patients = Arc::new(InMemoryPatientDirectory::new());
    for (patient_id, practice_id) in [("p-1", "practice-1"), ("p-2", "practice-1"), ("p-9", "practice-2")] {
        patients
            .insert_patient(PatientRecord {
                patient_id: patient_id.to_string(),
                practice_id: practice_id.to_string(),
                first_name: "Anna".to_string(),
                last_name: "Schmidt".to_string(),
                is_active: true,
            })
            .expect("patient");
    }
    let resolver = CredentialResolver::new(
        store.clone(),
        patients,
        LookupHasher::new(b"lookup-key").expect("hasher"),
        IdentifierCipher::new([9u8; 32]),
    );
    Fixture { store, resolver }
}

fn issue_input(patient_id: &str, raw: &str, expires_at_ms: Option<i64>) -> IssueCredential {
    IssueCredential {
        practice_id: "practice-1".to_string(),
        patient_id: patient_id.to_string(),
        raw_identifier: raw.to_string(),
        card_type: CredentialType::Egk,
        label: Some("Versichertenkarte".to_string()),
        expires_at_ms,
    }
}

#[tokio::test]
async fn issued_credential_resolves_with_any_uid_formatting() {
    let fx = fixture();
    let ctx = PracticeContext::system().scoped_to("practice-1");
    let issued = fx
        .resolver
        .issue(&ctx, issue_input("p-1", "04:a2:3b:9f", None))
        .await
        .expect("issue");
    assert!(!issued.encrypted_identifier.contains("04A23B9F"));

    let resolved = fx
        .resolver
        .resolve(&ctx, "04A2-3B9F")
        .await
        .expect("resolve")
        .expect("credential");
    assert_eq!(resolved.token_id, issued.token_id);
    assert!(resolved.last_used_at_ms.is_some());
}

#[tokio::test]
async fn duplicate_active_identifier_rejected() {
    let fx = fixture();
    let ctx = PracticeContext::system().scoped_to("practice-1");
    fx.resolver
        .issue(&ctx, issue_input("p-1", "04A23B9F", None))
        .await
        .expect("issue");
    let err = fx
        .resolver
        .issue(&ctx, issue_input("p-2", "04a23b9f", None))
        .await
        .expect_err("duplicate");
    assert!(matches!(err, CredentialError::AlreadyRegistered));
}

#[tokio::test]
async fn expired_and_revoked_credentials_never_resolve() {
    let fx = fixture();
    let ctx = PracticeContext::system().scoped_to("practice-1");
    fx.resolver
        .issue(&ctx, issue_input("p-1", "AAAA1111", Some(1)))
        .await
        .expect("issue");
    let resolution = fx
        .resolver
        .resolve_detailed(&ctx, "AAAA1111")
        .await
        .expect("resolve");
    assert!(matches!(resolution, Resolution::Expired(_)));
    assert_eq!(resolution.failure_reason(), Some("credential_expired"));

    let issued = fx
        .resolver
        .issue(&ctx, issue_input("p-1", "BBBB2222", None))
        .await
        .expect("issue");
    assert!(fx.resolver.revoke(&ctx, &issued.token_id).await.expect("revoke"));
    assert!(!fx.resolver.revoke(&ctx, &issued.token_id).await.expect("revoke again"));
    let resolved = fx.resolver.resolve(&ctx, "BBBB2222").await.expect("resolve");
    assert!(resolved.is_none());
}

#[tokio::test]
async fn unknown_identifier_reports_digest() {
    let fx = fixture();
    let ctx = PracticeContext::system().scoped_to("practice-1");
    let resolution = fx
        .resolver
        .resolve_detailed(&ctx, "FFFF0000")
        .await
        .expect("resolve");
    match resolution {
        Resolution::NotFound { lookup_digest } => assert_eq!(lookup_digest.len(), 64),
        other => panic!("unexpected resolution: {:?}", other),
    }
}

#[tokio::test]
async fn reissue_rebinds_inactive_token() {
    let fx = fixture();
    let ctx = PracticeContext::system().scoped_to("practice-1");
    let first = fx
        .resolver
        .issue(&ctx, issue_input("p-1", "CCCC3333", None))
        .await
        .expect("issue");
    fx.resolver.revoke(&ctx, &first.token_id).await.expect("revoke");

    let second = fx
        .resolver
        .issue(&ctx, issue_input("p-2", "CCCC3333", None))
        .await
        .expect("reissue");
    assert_eq!(second.token_id, first.token_id);
    assert_eq!(second.patient_id, "p-2");
    let stored = fx
        .store
        .find_credential(&ctx, &first.token_id)
        .await
        .expect("find")
        .expect("credential");
    assert!(stored.is_active);
    assert!(fx.store.list_patient_credentials(&ctx, "p-1").await.expect("list").is_empty());
}

#[tokio::test]
async fn other_practice_cannot_resolve_or_issue() {
    let fx = fixture();
    let ctx = PracticeContext::system().scoped_to("practice-1");
    fx.resolver
        .issue(&ctx, issue_input("p-1", "DDDD4444", None))
        .await
        .expect("issue");
    let other = PracticeContext::system().scoped_to("practice-2");
    assert!(fx.resolver.resolve(&other, "DDDD4444").await.expect("resolve").is_none());

    let err = fx
        .resolver
        .issue(&ctx, issue_input("p-9", "EEEE5555", None))
        .await
        .expect_err("foreign patient");
    assert!(matches!(err, CredentialError::PatientNotFound));
}

#[tokio::test]
async fn patient_listing_masks_identifier() {
    let fx = fixture();
    let ctx = PracticeContext::system().scoped_to("practice-1");
    fx.resolver
        .issue(&ctx, issue_input("p-1", "04A23B9F11", None))
        .await
        .expect("issue");
    let views = fx.resolver.list_for_patient(&ctx, "p-1").await.expect("list");
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].masked_identifier, "******9F11");
}
