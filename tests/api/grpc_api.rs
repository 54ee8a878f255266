use claim::{assert_none, assert_ok};
use tonic::Code;

use mailing_list::codec::{timestamp_from_unix, timestamp_to_unix};
use mailing_list::domain::email_entry::EmailEntry;
use mailing_list::grpc::proto::mailing_list_service_client::MailingListServiceClient;
use mailing_list::grpc::proto::{self, UpdateEmailRequest};

use crate::helpers::TestApp;

#[tokio::test]
async fn create_returns_the_new_unconfirmed_entry() {
    let test_app = TestApp::spawn_app().await;
    let mut client = test_app.grpc_client().await;

    let entry = client.create_email("a@x.com").await.unwrap().unwrap();

    assert_eq!(entry.email, "a@x.com");
    assert_eq!(timestamp_to_unix(&entry.confirmed_at), 0);
    assert!(!entry.opt_out);
}

#[tokio::test]
async fn create_of_a_duplicate_email_fails_with_already_exists() {
    let test_app = TestApp::spawn_app().await;
    let mut client = test_app.grpc_client().await;
    client.create_email("a@x.com").await.unwrap();

    let status = client.create_email("a@x.com").await.unwrap_err();

    assert_eq!(status.code(), Code::AlreadyExists);
}

#[tokio::test]
async fn create_of_an_invalid_email_fails_with_invalid_argument() {
    let test_app = TestApp::spawn_app().await;
    let mut client = test_app.grpc_client().await;

    let test_cases = vec![("", "empty address"), ("test.com", "missing @")];

    for (address, error_message) in test_cases {
        let status = client.create_email(address).await.unwrap_err();

        assert_eq!(
            status.code(),
            Code::InvalidArgument,
            "The API did not fail with InvalidArgument for {}",
            error_message
        );
    }
}

#[tokio::test]
async fn get_of_an_unknown_email_returns_an_empty_response() {
    let test_app = TestApp::spawn_app().await;
    let mut client = test_app.grpc_client().await;

    let entry = client.get_email("nobody@x.com").await.unwrap();

    assert_none!(entry);
}

#[tokio::test]
async fn get_of_an_invalid_email_returns_an_empty_response() {
    let test_app = TestApp::spawn_app().await;
    let mut client = test_app.grpc_client().await;

    for address in ["", "test.com"] {
        let entry = client.get_email(address).await.unwrap();

        assert_none!(entry, "An entry was returned for {:?}", address);
    }
}

#[tokio::test]
async fn update_upserts_by_email_and_keeps_the_id() {
    let test_app = TestApp::spawn_app().await;
    let mut client = test_app.grpc_client().await;
    let mut entry = client.create_email("a@x.com").await.unwrap().unwrap();

    entry.confirmed_at = timestamp_from_unix(10_000).unwrap();
    let updated = client.update_email(&entry).await.unwrap().unwrap();

    assert_eq!(updated.id, entry.id);
    assert_eq!(timestamp_to_unix(&updated.confirmed_at), 10_000);
    assert_eq!(client.get_email("a@x.com").await.unwrap(), Some(updated));
}

#[tokio::test]
async fn update_of_an_unknown_email_creates_it() {
    let test_app = TestApp::spawn_app().await;
    let mut client = test_app.grpc_client().await;
    let entry = EmailEntry {
        email: String::from("new@x.com"),
        confirmed_at: timestamp_from_unix(5).unwrap(),
        ..EmailEntry::default()
    };

    let created = client.update_email(&entry).await.unwrap().unwrap();

    assert!(created.id > 0);
    assert_eq!(timestamp_to_unix(&created.confirmed_at), 5);
}

#[tokio::test]
async fn update_without_an_email_fails_with_invalid_argument() {
    let test_app = TestApp::spawn_app().await;
    let mut client = test_app.grpc_client().await;

    let status = client
        .update_email(&EmailEntry::default())
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn update_with_an_unrepresentable_timestamp_fails_with_invalid_argument() {
    let test_app = TestApp::spawn_app().await;
    let mut client = test_app.grpc_client().await;
    client.create_email("a@x.com").await.unwrap();
    // The typed client cannot carry such a timestamp, so use the generated one
    let mut raw_client = MailingListServiceClient::connect(test_app.grpc_address.clone())
        .await
        .unwrap();

    let status = raw_client
        .update_email(UpdateEmailRequest {
            email_entry: Some(proto::EmailEntry {
                email: String::from("a@x.com"),
                confirmed_at: i64::MAX,
                ..proto::EmailEntry::default()
            }),
        })
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::InvalidArgument);
    let entry = client.get_email("a@x.com").await.unwrap().unwrap();
    assert_eq!(timestamp_to_unix(&entry.confirmed_at), 0);
}

#[tokio::test]
async fn delete_of_an_invalid_email_returns_an_empty_response() {
    let test_app = TestApp::spawn_app().await;
    let mut client = test_app.grpc_client().await;

    let deleted = client.delete_email("test.com").await;

    assert_ok!(&deleted);
    assert_none!(deleted.unwrap());
}

#[tokio::test]
async fn delete_returns_an_empty_response_and_hides_the_entry_from_batches() {
    let test_app = TestApp::spawn_app().await;
    let mut client = test_app.grpc_client().await;
    client.create_email("a@x.com").await.unwrap();
    client.create_email("b@x.com").await.unwrap();

    let deleted = client.delete_email("a@x.com").await;

    assert_ok!(&deleted);
    assert_none!(deleted.unwrap());

    let entry = client.get_email("a@x.com").await.unwrap().unwrap();
    assert!(entry.opt_out);

    let batch = client.get_email_batch(1, 5).await.unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].email, "b@x.com");
}

#[tokio::test]
async fn batch_pages_are_ordered_and_page_zero_is_the_first_page() {
    let test_app = TestApp::spawn_app().await;
    let mut client = test_app.grpc_client().await;
    let mut ids = Vec::new();
    for i in 0..5 {
        let entry = client
            .create_email(&format!("subscriber{}@test.com", i))
            .await
            .unwrap()
            .unwrap();
        ids.push(entry.id);
    }

    let second: Vec<i64> = client
        .get_email_batch(2, 2)
        .await
        .unwrap()
        .iter()
        .map(|entry| entry.id)
        .collect();
    let zero: Vec<i64> = client
        .get_email_batch(0, 2)
        .await
        .unwrap()
        .iter()
        .map(|entry| entry.id)
        .collect();

    assert_eq!(second, ids[2..4].to_vec());
    assert_eq!(zero, ids[0..2].to_vec());
}

#[tokio::test]
async fn batch_with_a_negative_count_fails_with_invalid_argument() {
    let test_app = TestApp::spawn_app().await;
    let mut client = test_app.grpc_client().await;

    let status = client.get_email_batch(1, -1).await.unwrap_err();

    assert_eq!(status.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn entries_deleted_over_grpc_are_opted_out_over_json() {
    let test_app = TestApp::spawn_app().await;
    let mut client = test_app.grpc_client().await;
    client.create_email("a@x.com").await.unwrap();

    client.delete_email("a@x.com").await.unwrap();

    let body: serde_json::Value = test_app.get_email("a@x.com").await.json().await.unwrap();
    assert_eq!(body["OptOut"], true);
}
