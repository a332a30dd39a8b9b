use rusqlite::Connection;
use shopfront::core::db::{db_connect, initialize_db};
use shopfront::core::error::ShopError;
use shopfront::shop::accounts::{register, User};
use shopfront::shop::catalog::{create_product, Product, ProductInput};
use shopfront::shop::reviews::{
    add_review, delete_review, list_reviews, rating_summary, MAX_REVIEW_CHARS,
};
use tempfile::tempdir;

fn test_db() -> (tempfile::TempDir, Connection) {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("shop.db");
    initialize_db(&path).unwrap();
    let conn = db_connect(&path).unwrap();
    (tmp, conn)
}

fn product(conn: &Connection, name: &str) -> Product {
    create_product(
        conn,
        &ProductInput {
            name: name.to_string(),
            price_cents: 1500,
            stock: 10,
            is_active: true,
            ..ProductInput::default()
        },
    )
    .unwrap()
}

fn shopper(conn: &Connection, email: &str, name: &str) -> User {
    register(conn, email, name, "correct horse").unwrap()
}

#[test]
fn test_rating_must_be_one_to_five() {
    let (_tmp, conn) = test_db();
    let beans = product(&conn, "Beans");
    let ada = shopper(&conn, "ada@example.com", "Ada");

    for rating in [0, 6, -1] {
        assert!(matches!(
            add_review(&conn, ada.id, beans.id, rating, "fine"),
            Err(ShopError::Validation(_))
        ));
    }
    assert!(list_reviews(&conn, beans.id).unwrap().is_empty());

    let review = add_review(&conn, ada.id, beans.id, 5, "  Rich and smooth.  ").unwrap();
    assert_eq!(review.rating, 5);
    assert_eq!(review.body, "Rich and smooth.");
    assert_eq!(review.author_name, "Ada");
}

#[test]
fn test_body_length_is_limited() {
    let (_tmp, conn) = test_db();
    let beans = product(&conn, "Beans");
    let ada = shopper(&conn, "ada@example.com", "Ada");

    let too_long = "a".repeat(MAX_REVIEW_CHARS + 1);
    assert!(matches!(
        add_review(&conn, ada.id, beans.id, 4, &too_long),
        Err(ShopError::Validation(_))
    ));
    // The limit counts characters, not bytes.
    let at_limit = "é".repeat(MAX_REVIEW_CHARS);
    assert!(add_review(&conn, ada.id, beans.id, 4, &at_limit).is_ok());
}

#[test]
fn test_one_review_per_user_and_product() {
    let (_tmp, conn) = test_db();
    let beans = product(&conn, "Beans");
    let mug = product(&conn, "Mug");
    let ada = shopper(&conn, "ada@example.com", "Ada");

    add_review(&conn, ada.id, beans.id, 4, "good").unwrap();
    assert!(matches!(
        add_review(&conn, ada.id, beans.id, 2, "changed my mind"),
        Err(ShopError::Conflict(_))
    ));
    assert!(add_review(&conn, ada.id, mug.id, 3, "").is_ok());
    assert_eq!(list_reviews(&conn, beans.id).unwrap().len(), 1);
}

#[test]
fn test_summary_and_moderation_delete() {
    let (_tmp, conn) = test_db();
    let beans = product(&conn, "Beans");
    let ada = shopper(&conn, "ada@example.com", "Ada");
    let bob = shopper(&conn, "bob@example.com", "Bob");

    let empty = rating_summary(&conn, beans.id).unwrap();
    assert_eq!(empty.count, 0);
    assert_eq!(empty.average, 0.0);

    let first = add_review(&conn, ada.id, beans.id, 5, "great").unwrap();
    add_review(&conn, bob.id, beans.id, 2, "bitter").unwrap();
    let summary = rating_summary(&conn, beans.id).unwrap();
    assert_eq!(summary.count, 2);
    assert!((summary.average - 3.5).abs() < f64::EPSILON);

    assert_eq!(delete_review(&conn, first.id).unwrap(), beans.id);
    let summary = rating_summary(&conn, beans.id).unwrap();
    assert_eq!(summary.count, 1);
    assert!((summary.average - 2.0).abs() < f64::EPSILON);
    assert!(matches!(
        delete_review(&conn, first.id),
        Err(ShopError::NotFound(_))
    ));

    // Ada may review again once her review is removed.
    assert!(add_review(&conn, ada.id, beans.id, 4, "second look").is_ok());
}
