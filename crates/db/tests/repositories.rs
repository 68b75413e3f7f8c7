//! Repository integration tests against a real Postgres database.
//!
//! Run with `DATABASE_URL` pointing at a server where the test user may
//! create databases, then `cargo test -p roastme-db -- --ignored`.

use chrono::Utc;
use roastme_core::credits::CreditPackage;
use roastme_core::generation::{GenerationParams, GenerationStatus};
use roastme_core::prompt::CharacterStyle;
use roastme_db::models::character::{CompletedRenditions, CreateCharacter};
use roastme_db::models::credit::{CreditPurchase, PurchaseOutcome};
use roastme_db::repositories::{CharacterRepo, CreditLedgerRepo, UserRepo, WaitlistRepo};
use sqlx::PgPool;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_character(user_id: i64, slug: &str) -> CreateCharacter {
    CreateCharacter {
        user_id,
        image_upload_id: None,
        slug: slug.to_string(),
        style: CharacterStyle::ActionFigure.as_str().to_string(),
        generation_params: GenerationParams::new(CharacterStyle::ActionFigure, Utc::now()),
    }
}

fn purchase(user_id: i64, event_id: &str) -> CreditPurchase {
    CreditPurchase {
        provider: "stripe".into(),
        event_id: event_id.into(),
        user_id,
        package: CreditPackage::Popular,
        amount_cents: Some(999),
    }
}

// ---------------------------------------------------------------------------
// Users and credits
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn anonymous_user_is_created_once_with_grant(pool: PgPool) {
    let session = Uuid::new_v4();
    let first = UserRepo::find_or_create_anonymous(&pool, session, 1).await.unwrap();
    let second = UserRepo::find_or_create_anonymous(&pool, session, 1).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.credits, 1);
    assert!(first.is_anonymous());

    let ledger = CreditLedgerRepo::list_by_user(&pool, first.id, 10).await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].reason, "signup_grant");
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn purchase_is_applied_exactly_once(pool: PgPool) {
    let user = UserRepo::find_or_create_authenticated(&pool, "user_abc", None, 1)
        .await
        .unwrap();

    let outcome = UserRepo::apply_purchase(&pool, &purchase(user.id, "evt_1")).await.unwrap();
    assert_eq!(outcome, PurchaseOutcome::Credited { balance: 16 });

    let replay = UserRepo::apply_purchase(&pool, &purchase(user.id, "evt_1")).await.unwrap();
    assert_eq!(replay, PurchaseOutcome::Duplicate);

    let user = UserRepo::find_by_id(&pool, user.id).await.unwrap().unwrap();
    assert_eq!(user.credits, 16);
    assert_eq!(user.plan, "popular");
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn purchase_for_missing_user_is_reported(pool: PgPool) {
    let outcome = UserRepo::apply_purchase(&pool, &purchase(424242, "evt_x")).await.unwrap();
    assert_eq!(outcome, PurchaseOutcome::UnknownUser);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn debit_fails_without_credits(pool: PgPool) {
    let user = UserRepo::find_or_create_anonymous(&pool, Uuid::new_v4(), 1).await.unwrap();

    let first = CharacterRepo::create_with_debit(&pool, &new_character(user.id, "a-1"), 1)
        .await
        .unwrap();
    assert!(first.is_some());

    let second = CharacterRepo::create_with_debit(&pool, &new_character(user.id, "a-2"), 1)
        .await
        .unwrap();
    assert!(second.is_none(), "zero balance must not create a character");

    let user = UserRepo::find_by_id(&pool, user.id).await.unwrap().unwrap();
    assert_eq!(user.credits, 0);
    assert!(CharacterRepo::find_by_slug(&pool, "a-2").await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn claim_moves_characters_and_purchased_credits(pool: PgPool) {
    let session = Uuid::new_v4();
    let anon = UserRepo::find_or_create_anonymous(&pool, session, 1).await.unwrap();
    UserRepo::apply_purchase(&pool, &purchase(anon.id, "evt_anon")).await.unwrap();
    CharacterRepo::create_with_debit(&pool, &new_character(anon.id, "claim-me"), 1)
        .await
        .unwrap();
    let owner = UserRepo::find_or_create_authenticated(&pool, "user_owner", None, 1)
        .await
        .unwrap();

    let outcome = UserRepo::claim_anonymous(&pool, session, owner.id)
        .await
        .unwrap()
        .expect("anonymous user should be claimable");
    assert_eq!(outcome.characters_moved, 1);
    assert_eq!(outcome.credits_moved, 15);
    assert_eq!(outcome.balance, 16);

    let character = CharacterRepo::find_by_slug(&pool, "claim-me").await.unwrap().unwrap();
    assert!(character.is_owned_by(owner.id));
    assert!(UserRepo::find_by_id(&pool, anon.id).await.unwrap().is_none());

    let again = UserRepo::claim_anonymous(&pool, session, owner.id).await.unwrap();
    assert!(again.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn repeated_claims_do_not_stack_signup_grants(pool: PgPool) {
    let owner = UserRepo::find_or_create_authenticated(&pool, "user_farmer", None, 1)
        .await
        .unwrap();

    for _ in 0..3 {
        let session = Uuid::new_v4();
        UserRepo::find_or_create_anonymous(&pool, session, 1).await.unwrap();
        let outcome = UserRepo::claim_anonymous(&pool, session, owner.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.credits_moved, 0);
        assert_eq!(outcome.balance, 1);
    }
}

// ---------------------------------------------------------------------------
// Characters
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn status_update_is_compare_and_set(pool: PgPool) {
    let user = UserRepo::find_or_create_anonymous(&pool, Uuid::new_v4(), 1).await.unwrap();
    let character = CharacterRepo::create(&pool, &new_character(user.id, "cas"))
        .await
        .unwrap();

    let mut params = character.params();
    params.transition(GenerationStatus::Generating, Utc::now()).unwrap();

    let updated = CharacterRepo::update_generation(
        &pool,
        character.id,
        GenerationStatus::Pending,
        &params,
    )
    .await
    .unwrap();
    assert_eq!(updated.unwrap().status(), GenerationStatus::Generating);

    // Second writer still believes the row is pending.
    let stale = CharacterRepo::update_generation(
        &pool,
        character.id,
        GenerationStatus::Pending,
        &params,
    )
    .await
    .unwrap();
    assert!(stale.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn completed_public_characters_reach_gallery(pool: PgPool) {
    let user = UserRepo::find_or_create_anonymous(&pool, Uuid::new_v4(), 1).await.unwrap();
    let character = CharacterRepo::create(&pool, &new_character(user.id, "gallery"))
        .await
        .unwrap();
    assert_eq!(CharacterRepo::count_public(&pool).await.unwrap(), 0);

    let mut params = character.params();
    params.transition(GenerationStatus::Generating, Utc::now()).unwrap();
    CharacterRepo::update_generation(&pool, character.id, GenerationStatus::Pending, &params)
        .await
        .unwrap();
    params.transition(GenerationStatus::Completed, Utc::now()).unwrap();
    let renditions = CompletedRenditions {
        model_url: "https://cdn/x/full.png".into(),
        medium_url: "https://cdn/x/medium.jpg".into(),
        thumbnail_url: "https://cdn/x/thumb.jpg".into(),
        og_title: "Action figure".into(),
        og_description: "A roast".into(),
    };
    CharacterRepo::complete(
        &pool,
        character.id,
        GenerationStatus::Generating,
        &renditions,
        &params,
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(CharacterRepo::count_public(&pool).await.unwrap(), 1);
    let page = CharacterRepo::list_public(&pool, 24, 0).await.unwrap();
    assert_eq!(page[0].slug, "gallery");

    CharacterRepo::set_visibility(&pool, character.id, user.id, false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(CharacterRepo::count_public(&pool).await.unwrap(), 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn likes_are_counted_once_per_user(pool: PgPool) {
    let user = UserRepo::find_or_create_anonymous(&pool, Uuid::new_v4(), 1).await.unwrap();
    let character = CharacterRepo::create(&pool, &new_character(user.id, "liked"))
        .await
        .unwrap();

    assert_eq!(CharacterRepo::like(&pool, character.id, user.id).await.unwrap(), Some(1));
    assert_eq!(CharacterRepo::like(&pool, character.id, user.id).await.unwrap(), Some(1));
    assert_eq!(CharacterRepo::like(&pool, 999_999, user.id).await.unwrap(), None);
    assert_eq!(
        CharacterRepo::increment_views(&pool, character.id).await.unwrap(),
        Some(1)
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn views_and_likes_do_not_delay_stale_detection(pool: PgPool) {
    let user = UserRepo::find_or_create_anonymous(&pool, Uuid::new_v4(), 1).await.unwrap();
    let character = CharacterRepo::create(&pool, &new_character(user.id, "stuck"))
        .await
        .unwrap();
    let mut params = character.params();
    params.transition(GenerationStatus::Generating, Utc::now()).unwrap();
    CharacterRepo::update_generation(&pool, character.id, GenerationStatus::Pending, &params)
        .await
        .unwrap()
        .unwrap();

    sqlx::query(
        "UPDATE characters SET generation_updated_at = NOW() - INTERVAL '30 minutes'
         WHERE id = $1",
    )
    .bind(character.id)
    .execute(&pool)
    .await
    .unwrap();
    CharacterRepo::increment_views(&pool, character.id).await.unwrap();
    CharacterRepo::like(&pool, character.id, user.id).await.unwrap();

    let cutoff = Utc::now() - chrono::Duration::minutes(15);
    let stale = CharacterRepo::list_stale(&pool, GenerationStatus::Generating, cutoff)
        .await
        .unwrap();
    assert_eq!(stale.iter().map(|c| c.id).collect::<Vec<_>>(), vec![character.id]);

    // A generation write refreshes it.
    CharacterRepo::update_generation(&pool, character.id, GenerationStatus::Generating, &params)
        .await
        .unwrap()
        .unwrap();
    let stale = CharacterRepo::list_stale(&pool, GenerationStatus::Generating, cutoff)
        .await
        .unwrap();
    assert!(stale.is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_slug_violates_unique_constraint(pool: PgPool) {
    let user = UserRepo::find_or_create_anonymous(&pool, Uuid::new_v4(), 1).await.unwrap();
    CharacterRepo::create(&pool, &new_character(user.id, "same")).await.unwrap();
    let err = CharacterRepo::create(&pool, &new_character(user.id, "same"))
        .await
        .unwrap_err();
    let db_err = err.as_database_error().expect("database error");
    assert_eq!(db_err.constraint(), Some("uq_characters_slug"));
}

// ---------------------------------------------------------------------------
// Waitlist
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn waitlist_signup_is_idempotent(pool: PgPool) {
    assert!(WaitlistRepo::signup(&pool, "a@example.com", Some("hero")).await.unwrap());
    assert!(!WaitlistRepo::signup(&pool, "a@example.com", None).await.unwrap());

    let row = WaitlistRepo::find_by_email(&pool, "a@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.source.as_deref(), Some("hero"));
}
