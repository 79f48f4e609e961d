use std::sync::Arc;

use ormlet::{ClassMetadata, Column, Model, OrmletError, Query, Resource, SqliteDriver, installed_driver, use_driver};

struct Task;
impl Model for Task {
    fn declare(class: &mut ClassMetadata) {
        class.model_name("task").field("label", Column::text()).field("done", Column::boolean());
    }
}

// The installed driver is process-wide, so the whole lifecycle lives in one test.
#[tokio::test]
async fn operations_use_the_installed_driver() {
    assert!(matches!(installed_driver(), Err(OrmletError::NoDriver)));
    let err = Resource::<Task>::new().with("label", "early").save().await.unwrap_err();
    assert!(matches!(err, OrmletError::NoDriver));
    assert!(matches!(Resource::<Task>::create().await, Err(OrmletError::NoDriver)));

    use_driver(Arc::new(SqliteDriver::open_in_memory().unwrap()));
    assert_eq!(installed_driver().unwrap().name(), "sqlite");

    Resource::<Task>::create().await.unwrap();
    let key = Resource::<Task>::new().with("label", "write docs").save().await.unwrap();
    Resource::<Task>::new().with("label", "ship").with("done", true).save().await.unwrap();

    let first = Resource::<Task>::new().with("id", key).find().await.unwrap();
    assert_eq!(first.get("label").and_then(|v| v.as_str()), Some("write docs"));

    let mut open = Query::new();
    open.where_("done").is(false);
    assert_eq!(Resource::<Task>::find_all(&open).await.unwrap(), vec![first.clone()]);

    first.remove().await.unwrap();
    assert!(first.find().await.unwrap_err().is_not_found());
    assert_eq!(Resource::<Task>::find_all(&Query::new()).await.unwrap().len(), 1);
}
