mod common;

use std::sync::Arc;

use serde_json::json;

use common::{CompletionOrder, MyUser, ScriptedAdapter, Session};
use restq::{
    Action, Error, ErrorSpec, Handle, ResourceExt, Runner, StubAdapter, StubRegistry, params,
};

fn stub_runner() -> (Runner, Arc<StubRegistry>) {
    let registry = Arc::new(StubRegistry::new());
    registry.enable();
    registry.set_allow_requests(false);
    let adapter = Arc::new(StubAdapter::new(registry.clone()));
    (Runner::new(adapter), registry)
}

#[tokio::test]
async fn test_stubbed_read_populates_typed_attributes() {
    let (runner, registry) = stub_runner();
    registry
        .expect::<MyUser>(Action::Read)
        .with(params! {"id" => 1})
        .and_return(json!({"id": 1, "name": "John Smith", "age": 32}));

    let user = MyUser::find(&runner, 1);
    assert!(!user.loaded());

    runner.start().await.unwrap();

    assert!(user.loaded());
    assert_eq!(user.get("id"), json!(1));
    assert_eq!(user.get("name"), json!("John Smith"));
    assert_eq!(user.get("age"), json!(32));
}

#[tokio::test]
async fn test_stubbed_payload_is_cast_through_the_schema() {
    let (runner, registry) = stub_runner();
    // Sloppy canned data: age as a string, name as a number.
    registry
        .expect::<MyUser>(Action::Read)
        .with(params! {"id" => 1})
        .and_return(json!({"id": "1", "name": 9000, "age": "32"}));

    let user = MyUser::find(&runner, 1);
    runner.start().await.unwrap();

    assert_eq!(user.get("id"), json!(1));
    assert_eq!(user.get("name"), json!("9000"));
    assert_eq!(user.get("age"), json!(32));
}

#[tokio::test]
async fn test_symbolic_not_found_maps_to_typed_error() {
    let (runner, registry) = stub_runner();
    registry
        .expect::<MyUser>(Action::Read)
        .with(params! {"id" => 3})
        .and_raise(ErrorSpec::NotFound);

    MyUser::find(&runner, 3);
    let err = runner.start().await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[derive(Debug, thiserror::Error)]
#[error("special custom error")]
struct SpecialCustomError;

#[tokio::test]
async fn test_literal_error_values_pass_through_unchanged() {
    let (runner, registry) = stub_runner();
    registry
        .expect::<MyUser>(Action::Read)
        .with(params! {"id" => 2})
        .and_raise(ErrorSpec::custom(SpecialCustomError));

    MyUser::find(&runner, 2);
    let err = runner.start().await.unwrap_err();
    match err {
        Error::Custom(inner) => assert_eq!(inner.to_string(), "special custom error"),
        other => panic!("expected pass-through error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_stubbed_create() {
    let (runner, registry) = stub_runner();
    registry
        .expect::<Session>(Action::Create)
        .with(params! {"ident" => "john@example.org", "password" => "s3cr3t"})
        .and_return(json!({"id": "longhash", "user": 1}));

    let session = Session::create(
        &runner,
        params! {"ident" => "john@example.org", "password" => "s3cr3t"},
    )
    .unwrap();
    runner.start().await.unwrap();

    assert_eq!(session.get("id"), json!("longhash"));
    assert_eq!(session.get("user"), json!(1));
}

#[tokio::test]
async fn test_stubbed_create_raising_422_fails_the_flush() {
    let (runner, registry) = stub_runner();
    registry
        .expect::<Session>(Action::Create)
        .with(params! {"ident" => "a@b.org", "password" => "bad"})
        .and_raise(422);

    Session::create(&runner, params! {"ident" => "a@b.org", "password" => "bad"}).unwrap();
    let err = runner.start().await.unwrap_err();
    assert!(matches!(err, Error::InvalidResource { .. }));
}

#[tokio::test]
async fn test_predicate_matcher_selects_by_operation_contents() {
    let (runner, registry) = stub_runner();
    registry
        .expect::<Session>(Action::Create)
        .matching(|op| {
            op.params().get("ident") == Some(&json!("john@example.org"))
                && op.params().get("password") == Some(&json!("wrong"))
        })
        .and_raise(ErrorSpec::Invalid(
            [("password".to_string(), vec!["is invalid".to_string()])].into(),
        ));

    Session::create(
        &runner,
        params! {"ident" => "john@example.org", "password" => "wrong"},
    )
    .unwrap();
    let err = runner.start().await.unwrap_err();
    match err {
        Error::InvalidResource { errors } => {
            assert_eq!(errors["password"], vec!["is invalid".to_string()]);
        }
        other => panic!("expected invalid resource, got {other:?}"),
    }
}

#[tokio::test]
async fn test_stubbed_update_round_trip() {
    let (runner, registry) = stub_runner();
    registry
        .expect::<MyUser>(Action::Read)
        .with(params! {"id" => 1})
        .and_return(json!({"id": 1, "name": "John Smith", "age": 32}));
    registry
        .expect::<MyUser>(Action::Update)
        .with(params! {"id" => 1, "name" => "John Smith", "age" => 22})
        .and_return(json!({"id": 1, "name": "John Smith", "age": 23}));

    let user = MyUser::find(&runner, 1);
    runner.start().await.unwrap();

    user.set("age", json!(22)).unwrap();
    user.save(&runner);
    runner.start().await.unwrap();

    // The service normalized the age; the response was assigned back.
    assert_eq!(user.get("age"), json!(23));
}

#[tokio::test]
async fn test_ambiguous_stubs_fail_the_flush_and_count_nothing() {
    let (runner, registry) = stub_runner();
    let returning = registry
        .expect::<MyUser>(Action::Read)
        .with(params! {"id" => 1})
        .and_return(json!({"id": 1, "name": "John Smith", "age": 32}));
    let raising = registry
        .expect::<MyUser>(Action::Read)
        .with(params! {"id" => 1})
        .and_raise(ErrorSpec::NotFound);

    MyUser::find(&runner, 1);
    let err = runner.start().await.unwrap_err();
    match err {
        Error::AmbiguousStub { candidates, .. } => assert_eq!(candidates.len(), 2),
        other => panic!("expected ambiguous stub error, got {other:?}"),
    }
    assert!(!returning.called());
    assert!(!raising.called());
}

#[tokio::test]
async fn test_call_counting() {
    let (runner, registry) = stub_runner();
    let stub = registry
        .expect::<MyUser>(Action::Read)
        .with(params! {"id" => 1})
        .and_return(json!({"id": 1, "name": "John Smith", "age": 32}));

    for _ in 0..3 {
        MyUser::find(&runner, 1);
        runner.start().await.unwrap();
    }

    assert!(stub.called());
    assert!(stub.called_times(3));
    assert!(!stub.called_times(2));
}

#[tokio::test]
async fn test_unmatched_operation_with_requests_disallowed() {
    let (runner, _registry) = stub_runner();

    MyUser::find(&runner, 2);
    let err = runner.start().await.unwrap_err();
    assert!(matches!(err, Error::RealRequestsNotAllowed { .. }));
}

#[tokio::test]
async fn test_unmatched_operation_falls_through_when_allowed() {
    let registry = Arc::new(StubRegistry::new());
    registry.enable();
    registry.set_allow_requests(true);

    // The "real" transport behind the stub.
    let real = Arc::new(ScriptedAdapter::new(CompletionOrder::Fifo, |_| {
        Ok(json!({"id": 2, "name": "John", "age": 26}))
    }));
    let runner = Runner::new(Arc::new(StubAdapter::with_fallback(
        registry.clone(),
        real,
    )));

    let user = MyUser::find(&runner, 2);
    runner.start().await.unwrap();
    assert_eq!(user.get("age"), json!(26));
}

#[tokio::test]
async fn test_disabled_registry_passes_everything_to_the_fallback() {
    let registry = Arc::new(StubRegistry::new());
    // An expectation exists but the registry is disabled.
    registry
        .expect::<MyUser>(Action::Read)
        .with(params! {"id" => 5})
        .and_raise(ErrorSpec::NotFound);

    let real = Arc::new(ScriptedAdapter::new(CompletionOrder::Fifo, |_| {
        Ok(json!({"id": 5, "name": "Real", "age": 1}))
    }));
    let runner = Runner::new(Arc::new(StubAdapter::with_fallback(
        registry.clone(),
        real,
    )));

    let user = MyUser::find(&runner, 5);
    runner.start().await.unwrap();
    assert_eq!(user.get("name"), json!("Real"));
}

#[tokio::test]
async fn test_reset_between_cases() {
    let (runner, registry) = stub_runner();
    registry
        .expect::<MyUser>(Action::Read)
        .with(params! {"id" => 1})
        .and_return(json!({"id": 1, "name": "John Smith", "age": 32}));
    registry.reset();

    MyUser::find(&runner, 1);
    let err = runner.start().await.unwrap_err();
    assert!(matches!(err, Error::RealRequestsNotAllowed { .. }));
}

#[tokio::test]
async fn test_destroy_marks_handle_unloaded() {
    let (runner, registry) = stub_runner();
    registry
        .expect::<MyUser>(Action::Read)
        .with(params! {"id" => 1})
        .and_return(json!({"id": 1, "name": "John Smith", "age": 32}));
    registry
        .expect::<MyUser>(Action::Delete)
        .with(params! {"id" => 1})
        .and_return(json!(null));

    let user: Handle<MyUser> = MyUser::find(&runner, 1);
    runner.start().await.unwrap();
    assert!(user.loaded());

    user.destroy(&runner);
    runner.start().await.unwrap();
    assert!(!user.loaded());
}

#[tokio::test]
async fn test_list_results_cast_element_wise() {
    let (runner, registry) = stub_runner();
    registry
        .expect::<MyUser>(Action::Read)
        .and_return(json!([{"id": "5", "age": "30"}, {"id": "6", "age": "31"}]));

    let users = MyUser::find_all(&runner, params! {});
    runner.start().await.unwrap();

    assert!(users.loaded());
    assert_eq!(users.len(), 2);
    assert_eq!(users.items()[0], json!({"id": 5, "age": 30}));
    assert_eq!(users.items()[1], json!({"id": 6, "age": 31}));
}
