//! Integration tests for the sale, route-pass and refund workflows.
//!
//! These tests need a PostgreSQL database; point `DATABASE_URL` at one
//! to run them (the schema is created on first use). Without the
//! variable each test exits early, so the suite stays green on machines
//! without a database.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, EntityTrait, Set,
};
use serde_json::json;
use uuid::Uuid;

use farebox_core::auth::AllowAll;
use farebox_core::booking::{BookingFlags, TripOrder};
use farebox_core::ledger::{Creator, TransactionType};
use farebox_core::payment::{CardSource, MockGateway};
use farebox_shared::config::{GatewayConfig, GatewayMode};
use farebox_shared::types::{
    CompanyId, TicketId, TripId, TripStopId, UserId,
};

use farebox_db::entities::{
    companies, promotions, route_passes, routes, sea_orm_active_enums, tickets,
    transactions as tx_entities, trip_stops, trips,
};
use farebox_db::workflows::{
    ChargeSaleArgs, RoutePassPurchaseInput, RoutePassRefundInput, TicketRefundInput,
    TicketSaleInput,
};
use farebox_db::{RefundWorkflow, RoutePassPurchaseWorkflow, SaleWorkflow};

// ============================================================================
// Harness
// ============================================================================

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS companies (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    sms_op_code TEXT,
    merchant_id TEXT,
    sandbox_merchant_id TEXT
);
CREATE TABLE IF NOT EXISTS routes (
    id UUID PRIMARY KEY,
    company_id UUID NOT NULL,
    label TEXT NOT NULL,
    tags JSONB NOT NULL
);
CREATE TABLE IF NOT EXISTS trips (
    id UUID PRIMARY KEY,
    route_id UUID NOT NULL,
    date TIMESTAMPTZ NOT NULL,
    price NUMERIC NOT NULL,
    seats_available INT NOT NULL,
    is_running BOOL NOT NULL,
    booking_info JSONB
);
CREATE TABLE IF NOT EXISTS trip_stops (
    id UUID PRIMARY KEY,
    trip_id UUID NOT NULL,
    stop_id UUID NOT NULL,
    time TIMESTAMPTZ NOT NULL
);
CREATE TABLE IF NOT EXISTS tickets (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL,
    trip_id UUID NOT NULL,
    board_stop_id UUID NOT NULL,
    alight_stop_id UUID NOT NULL,
    status TEXT NOT NULL,
    notes JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
CREATE TABLE IF NOT EXISTS route_passes (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL,
    company_id UUID NOT NULL,
    tag TEXT NOT NULL,
    status TEXT NOT NULL,
    notes JSONB NOT NULL,
    expires_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
CREATE TABLE IF NOT EXISTS transactions (
    id UUID PRIMARY KEY,
    transaction_type TEXT NOT NULL,
    committed BOOL NOT NULL,
    description TEXT,
    creator_scope TEXT NOT NULL,
    creator_id UUID,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
CREATE TABLE IF NOT EXISTS transaction_items (
    id UUID PRIMARY KEY,
    transaction_id UUID NOT NULL,
    item_type TEXT NOT NULL,
    item_id UUID,
    debit NUMERIC,
    credit NUMERIC,
    notes JSONB
);
CREATE TABLE IF NOT EXISTS payments (
    id UUID PRIMARY KEY,
    payment_resource TEXT,
    data JSONB,
    options JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE TABLE IF NOT EXISTS transfers (
    id UUID PRIMARY KEY,
    company_id UUID NOT NULL,
    incoming NUMERIC NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);
CREATE TABLE IF NOT EXISTS accounts (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS promotions (
    id UUID PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    company_id UUID,
    params JSONB NOT NULL,
    scope TEXT NOT NULL,
    usage_limit INT,
    usage_count INT NOT NULL,
    starts_at TIMESTAMPTZ,
    ends_at TIMESTAMPTZ
);
";

async fn test_db() -> Option<DatabaseConnection> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let db = Database::connect(&url)
        .await
        .expect("failed to connect to test database");
    db.execute_unprepared(SCHEMA)
        .await
        .expect("failed to create schema");
    Some(db)
}

fn gateway_config() -> GatewayConfig {
    GatewayConfig {
        mode: GatewayMode::Test,
        idempotency_tag: "it-tests".to_string(),
        home_country: "SG".to_string(),
    }
}

fn sale_workflow(db: &DatabaseConnection, gateway: Arc<MockGateway>) -> SaleWorkflow {
    SaleWorkflow::new(db.clone(), gateway, gateway_config())
}

fn refund_workflow(db: &DatabaseConnection, gateway: Arc<MockGateway>) -> RefundWorkflow {
    RefundWorkflow::new(db.clone(), gateway, Arc::new(AllowAll), gateway_config())
}

fn card() -> CardSource {
    CardSource {
        token: "tok_visa".to_string(),
        country: Some("SG".to_string()),
        brand: Some("Visa".to_string()),
    }
}

async fn seed_company(db: &DatabaseConnection) -> Uuid {
    let id = Uuid::now_v7();
    companies::ActiveModel {
        id: Set(id),
        name: Set("Amber Coaches".to_string()),
        sms_op_code: Set(Some("AMBR".to_string())),
        merchant_id: Set(Some("acct_live".to_string())),
        sandbox_merchant_id: Set(Some("acct_test".to_string())),
    }
    .insert(db)
    .await
    .expect("seed company");
    id
}

async fn seed_route(db: &DatabaseConnection, company_id: Uuid, tags: &[&str]) -> Uuid {
    let id = Uuid::now_v7();
    routes::ActiveModel {
        id: Set(id),
        company_id: Set(company_id),
        label: Set("R1".to_string()),
        tags: Set(json!(tags)),
    }
    .insert(db)
    .await
    .expect("seed route");
    id
}

/// Creates a running trip tomorrow with two stops; returns
/// (trip, board stop, alight stop).
async fn seed_trip(
    db: &DatabaseConnection,
    route_id: Uuid,
    price: Decimal,
    seats: i32,
) -> (Uuid, Uuid, Uuid) {
    let trip_id = Uuid::now_v7();
    let departs = Utc::now() + Duration::days(1);
    trips::ActiveModel {
        id: Set(trip_id),
        route_id: Set(route_id),
        date: Set(departs.into()),
        price: Set(price),
        seats_available: Set(seats),
        is_running: Set(true),
        booking_info: Set(Some(json!({ "windowType": "stop", "windowSize": 0 }))),
    }
    .insert(db)
    .await
    .expect("seed trip");

    let mut stop_ids = Vec::new();
    for offset in [0i64, 30] {
        let id = Uuid::now_v7();
        trip_stops::ActiveModel {
            id: Set(id),
            trip_id: Set(trip_id),
            stop_id: Set(Uuid::now_v7()),
            time: Set((departs + Duration::minutes(offset)).into()),
        }
        .insert(db)
        .await
        .expect("seed trip stop");
        stop_ids.push(id);
    }
    (trip_id, stop_ids[0], stop_ids[1])
}

/// Seeds a promotion under a per-run unique code (the table has a
/// unique code constraint and the database is reused across runs).
async fn seed_promo(
    db: &DatabaseConnection,
    prefix: &str,
    params: serde_json::Value,
    scope: sea_orm_active_enums::PromoScope,
) -> String {
    let code = format!("{prefix}-{}", Uuid::now_v7().simple());
    promotions::ActiveModel {
        id: Set(Uuid::now_v7()),
        code: Set(code.clone()),
        company_id: Set(None),
        params: Set(params),
        scope: Set(scope),
        usage_limit: Set(None),
        usage_count: Set(0),
        starts_at: Set(None),
        ends_at: Set(None),
    }
    .insert(db)
    .await
    .expect("seed promotion");
    code
}

fn order(trip: Uuid, board: Uuid, alight: Uuid, user: Uuid) -> TripOrder {
    TripOrder {
        trip_id: TripId::from_uuid(trip),
        board_stop_id: TripStopId::from_uuid(board),
        alight_stop_id: TripStopId::from_uuid(alight),
        user_id: UserId::from_uuid(user),
    }
}

fn sale_input(trips: Vec<TripOrder>) -> TicketSaleInput {
    TicketSaleInput {
        trips,
        promo_code: None,
        dry_run: false,
        apply_route_pass: false,
        checks: BookingFlags::default(),
        expected_price: None,
        creator: Creator::system(),
        committed: true,
        transaction_type: TransactionType::TicketPurchase,
        description: None,
    }
}

// ============================================================================
// Ticket sale
// ============================================================================

#[tokio::test]
async fn test_two_ticket_sale_builds_expected_items() {
    let Some(db) = test_db().await else { return };
    let gateway = Arc::new(MockGateway::new());
    let workflow = sale_workflow(&db, gateway);

    let company = seed_company(&db).await;
    let route = seed_route(&db, company, &[]).await;
    let (t1, b1, a1) = seed_trip(&db, route, dec!(5.00), 10).await;
    let (t2, b2, a2) = seed_trip(&db, route, dec!(10.00), 10).await;
    let user = Uuid::now_v7();

    let mut input = sale_input(vec![
        order(t1, b1, a1, user),
        order(t2, b2, a2, user),
    ]);
    input.expected_price = Some(dec!(15.00));

    let prepared = workflow.prepare_ticket_sale(input).await.expect("sale");
    assert_eq!(prepared.payment_amount, dec!(15.00));

    use farebox_core::ledger::ItemType;
    assert_eq!(prepared.draft.items_of(ItemType::TicketSale).len(), 2);
    assert_eq!(
        prepared.draft.payment_item().expect("payment item").amount,
        dec!(15.00)
    );
    assert_eq!(
        prepared.draft.transfer_item().expect("transfer item").amount,
        dec!(15.00)
    );
    assert_eq!(prepared.draft.items_of(ItemType::Account)[0].amount, dec!(15.00));
    assert_eq!(prepared.draft.total_debit(), prepared.draft.total_credit());

    // Persisted tickets are valid (committed sale).
    for ticket_id in &prepared.ticket_ids {
        let ticket = tickets::Entity::find_by_id(ticket_id.into_inner())
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ticket.status, sea_orm_active_enums::TicketStatus::Valid);
    }
}

#[tokio::test]
async fn test_stale_expected_price_rejected() {
    let Some(db) = test_db().await else { return };
    let workflow = sale_workflow(&db, Arc::new(MockGateway::new()));

    let company = seed_company(&db).await;
    let route = seed_route(&db, company, &[]).await;
    let (t1, b1, a1) = seed_trip(&db, route, dec!(15.00), 10).await;

    let mut input = sale_input(vec![order(t1, b1, a1, Uuid::now_v7())]);
    input.expected_price = Some(dec!(14.99));

    let err = workflow.prepare_ticket_sale(input).await.unwrap_err();
    assert!(err.to_string().contains("priceChanged"), "got: {err}");
}

#[tokio::test]
async fn test_duplicate_booking_names_existing_ticket() {
    let Some(db) = test_db().await else { return };
    let workflow = sale_workflow(&db, Arc::new(MockGateway::new()));

    let company = seed_company(&db).await;
    let route = seed_route(&db, company, &[]).await;
    let (t1, b1, a1) = seed_trip(&db, route, dec!(5.00), 10).await;
    let user = Uuid::now_v7();

    let first = workflow
        .prepare_ticket_sale(sale_input(vec![order(t1, b1, a1, user)]))
        .await
        .expect("first booking");

    let err = workflow
        .prepare_ticket_sale(sale_input(vec![order(t1, b1, a1, user)]))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 422);
    assert!(
        err.to_string().contains(&first.ticket_ids[0].to_string()),
        "error should name the existing ticket: {err}"
    );
}

#[tokio::test]
async fn test_seat_exhaustion_rejected() {
    let Some(db) = test_db().await else { return };
    let workflow = sale_workflow(&db, Arc::new(MockGateway::new()));

    let company = seed_company(&db).await;
    let route = seed_route(&db, company, &[]).await;
    let (t1, b1, a1) = seed_trip(&db, route, dec!(5.00), 0).await;

    let err = workflow
        .prepare_ticket_sale(sale_input(vec![order(t1, b1, a1, Uuid::now_v7())]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("out of seats"), "got: {err}");
}

#[tokio::test]
async fn test_dry_run_persists_nothing() {
    let Some(db) = test_db().await else { return };
    let workflow = sale_workflow(&db, Arc::new(MockGateway::new()));

    let company = seed_company(&db).await;
    let route = seed_route(&db, company, &[]).await;
    let (t1, b1, a1) = seed_trip(&db, route, dec!(5.00), 7).await;

    let mut input = sale_input(vec![order(t1, b1, a1, Uuid::now_v7())]);
    input.dry_run = true;

    let prepared = workflow.prepare_ticket_sale(input).await.expect("dry run");
    assert!(prepared.persisted.is_none());
    assert_eq!(prepared.payment_amount, dec!(5.00));

    // No ticket row, no seat taken, no transaction row.
    let ticket = tickets::Entity::find_by_id(prepared.ticket_ids[0].into_inner())
        .one(&db)
        .await
        .unwrap();
    assert!(ticket.is_none());
    let trip = trips::Entity::find_by_id(t1).one(&db).await.unwrap().unwrap();
    assert_eq!(trip.seats_available, 7);
    let tx = tx_entities::Entity::find_by_id(prepared.transaction_id.into_inner())
        .one(&db)
        .await
        .unwrap();
    assert!(tx.is_none());
}

// ============================================================================
// Promotions
// ============================================================================

#[tokio::test]
async fn test_percent_promo_distributes_proportionally() {
    let Some(db) = test_db().await else { return };
    let workflow = sale_workflow(&db, Arc::new(MockGateway::new()));

    let company = seed_company(&db).await;
    let route = seed_route(&db, company, &[]).await;
    let (t1, b1, a1) = seed_trip(&db, route, dec!(5.00), 10).await;
    let (t2, b2, a2) = seed_trip(&db, route, dec!(10.00), 10).await;
    let code = seed_promo(
        &db,
        "TWENTY",
        json!({ "type": "percent", "rate": "20" }),
        sea_orm_active_enums::PromoScope::Ticket,
    )
    .await;

    let user = Uuid::now_v7();
    let mut input = sale_input(vec![order(t1, b1, a1, user), order(t2, b2, a2, user)]);
    input.promo_code = Some(code.clone());

    let prepared = workflow.prepare_ticket_sale(input).await.expect("sale");
    assert_eq!(prepared.payment_amount, dec!(12.00));

    // Per-ticket discountValue: 1.00 and 2.00, proportional.
    let first = tickets::Entity::find_by_id(prepared.ticket_ids[0].into_inner())
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    let second = tickets::Entity::find_by_id(prepared.ticket_ids[1].into_inner())
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.notes["discountValue"], json!("1.00"));
    assert_eq!(second.notes["discountValue"], json!("2.00"));

    // One promo use consumed.
    use sea_orm::{ColumnTrait, QueryFilter};
    let promo = promotions::Entity::find()
        .filter(promotions::Column::Code.eq(code))
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(promo.usage_count, 1);
}

#[tokio::test]
async fn test_unknown_promo_rejected() {
    let Some(db) = test_db().await else { return };
    let workflow = sale_workflow(&db, Arc::new(MockGateway::new()));

    let company = seed_company(&db).await;
    let route = seed_route(&db, company, &[]).await;
    let (t1, b1, a1) = seed_trip(&db, route, dec!(5.00), 10).await;

    let mut input = sale_input(vec![order(t1, b1, a1, Uuid::now_v7())]);
    input.promo_code = Some("NO-SUCH-CODE".to_string());

    let err = workflow.prepare_ticket_sale(input).await.unwrap_err();
    assert_eq!(err.status_code(), 404);
}

// ============================================================================
// Route passes
// ============================================================================

async fn seed_pass(db: &DatabaseConnection, user: Uuid, company: Uuid, tag: &str, price: Decimal) -> Uuid {
    let id = Uuid::now_v7();
    let now = Utc::now();
    route_passes::ActiveModel {
        id: Set(id),
        user_id: Set(user),
        company_id: Set(company),
        tag: Set(tag.to_string()),
        status: Set(sea_orm_active_enums::RoutePassStatus::Valid),
        notes: Set(json!({ "price": price })),
        expires_at: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(db)
    .await
    .expect("seed pass");
    id
}

#[tokio::test]
async fn test_route_pass_redemption_and_undo_round_trip() {
    let Some(db) = test_db().await else { return };
    let workflow = sale_workflow(&db, Arc::new(MockGateway::new()));

    let company = seed_company(&db).await;
    let route = seed_route(&db, company, &["amber"]).await;
    let (t1, b1, a1) = seed_trip(&db, route, dec!(5.00), 10).await;
    let user = Uuid::now_v7();
    let pass = seed_pass(&db, user, company, "amber", dec!(5.00)).await;

    let mut input = sale_input(vec![order(t1, b1, a1, user)]);
    input.apply_route_pass = true;

    let prepared = workflow.prepare_ticket_sale(input).await.expect("sale");
    assert_eq!(prepared.payment_amount, Decimal::ZERO);

    // Pass consumed: valid → void.
    let consumed = route_passes::Entity::find_by_id(pass).one(&db).await.unwrap().unwrap();
    assert_eq!(consumed.status, sea_orm_active_enums::RoutePassStatus::Void);

    // Undo restores the pass and fails the sale's tickets.
    prepared.undo.run(&db).await.expect("undo");
    let restored = route_passes::Entity::find_by_id(pass).one(&db).await.unwrap().unwrap();
    assert_eq!(restored.status, sea_orm_active_enums::RoutePassStatus::Valid);
    let ticket = tickets::Entity::find_by_id(prepared.ticket_ids[0].into_inner())
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ticket.status, sea_orm_active_enums::TicketStatus::Failed);
}

#[tokio::test]
async fn test_small_residual_absorbed_no_charge() {
    let Some(db) = test_db().await else { return };
    let gateway = Arc::new(MockGateway::new());
    let workflow = sale_workflow(&db, gateway.clone());

    let company = seed_company(&db).await;
    let route = seed_route(&db, company, &[]).await;
    let (t1, b1, a1) = seed_trip(&db, route, dec!(0.30), 10).await;

    let prepared = workflow
        .prepare_ticket_sale(sale_input(vec![order(t1, b1, a1, Uuid::now_v7())]))
        .await
        .expect("sale");
    assert_eq!(prepared.payment_amount, Decimal::ZERO);

    use farebox_core::ledger::{ItemType, ABSORB_SMALL_PAYMENTS};
    let discounts = prepared.draft.items_of(ItemType::Discount);
    assert_eq!(discounts.len(), 1);
    assert_eq!(discounts[0].amount, dec!(0.30));
    assert_eq!(
        discounts[0].notes.as_ref().unwrap()["description"],
        ABSORB_SMALL_PAYMENTS
    );
    assert_eq!(prepared.draft.total_debit(), prepared.draft.total_credit());

    // Nothing to charge.
    let charged = workflow
        .charge_sale(ChargeSaleArgs {
            transaction_id: prepared.transaction_id,
            payment_id: prepared.payment_id,
            company_id: CompanyId::from_uuid(company),
            session_iat: 1,
            source: card(),
        })
        .await
        .expect("charge");
    assert!(charged.is_none());
    assert_eq!(gateway.charge_calls(), 0);
}

#[tokio::test]
async fn test_purchase_route_passes_by_quantity_and_value() {
    let Some(db) = test_db().await else { return };
    let workflow = RoutePassPurchaseWorkflow::new(db.clone());

    let company = seed_company(&db).await;
    let route = seed_route(&db, company, &["amber"]).await;
    let _ = seed_trip(&db, route, dec!(5.00), 10).await;
    let user = Uuid::now_v7();

    let purchase = workflow
        .purchase_route_pass(
            RoutePassPurchaseInput {
                user_id: UserId::from_uuid(user),
                company_id: CompanyId::from_uuid(company),
                tag: "amber".to_string(),
                quantity: Some(2),
                value: None,
                promo_code: None,
                dry_run: false,
                expected_price: Some(dec!(10.00)),
                creator: Creator::user(user),
                expires_at: None,
            },
            None,
        )
        .await
        .expect("purchase");
    assert_eq!(purchase.payment_amount, dec!(10.00));
    assert_eq!(purchase.pass_ids.len(), 2);

    for pass_id in &purchase.pass_ids {
        let pass = route_passes::Entity::find_by_id(pass_id.into_inner())
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pass.status, sea_orm_active_enums::RoutePassStatus::Valid);
        assert_eq!(pass.notes["price"], json!("5.00"));
    }

    // value 10.00 at price 5.00 buys 2 passes.
    let by_value = workflow
        .purchase_route_pass(
            RoutePassPurchaseInput {
                user_id: UserId::from_uuid(Uuid::now_v7()),
                company_id: CompanyId::from_uuid(company),
                tag: "amber".to_string(),
                quantity: None,
                value: Some(dec!(10.00)),
                promo_code: None,
                dry_run: false,
                expected_price: None,
                creator: Creator::system(),
                expires_at: None,
            },
            None,
        )
        .await
        .expect("purchase by value");
    assert_eq!(by_value.pass_ids.len(), 2);
    assert_eq!(by_value.payment_amount, dec!(10.00));
}

// ============================================================================
// Charging
// ============================================================================

#[tokio::test]
async fn test_charge_sale_is_idempotent_per_session() {
    let Some(db) = test_db().await else { return };
    let gateway = Arc::new(MockGateway::new());
    let workflow = sale_workflow(&db, gateway.clone());

    let company = seed_company(&db).await;
    let route = seed_route(&db, company, &[]).await;
    let (t1, b1, a1) = seed_trip(&db, route, dec!(15.00), 10).await;

    let prepared = workflow
        .prepare_ticket_sale(sale_input(vec![order(t1, b1, a1, Uuid::now_v7())]))
        .await
        .expect("sale");

    let args = ChargeSaleArgs {
        transaction_id: prepared.transaction_id,
        payment_id: prepared.payment_id,
        company_id: CompanyId::from_uuid(company),
        session_iat: 1_735_689_600,
        source: card(),
    };

    let first = workflow.charge_sale(args.clone()).await.expect("charge").unwrap();
    let second = workflow.charge_sale(args).await.expect("recharge").unwrap();

    // Same idempotency key: one gateway-side charge.
    assert_eq!(first.id, second.id);
    assert_eq!(gateway.charges_created(), 1);
    assert_eq!(gateway.charge_calls(), 2);

    // Charge outcome persisted onto the payment row.
    let payment = farebox_db::entities::payments::Entity::find_by_id(
        prepared.payment_id.into_inner(),
    )
    .one(&db)
    .await
    .unwrap()
    .unwrap();
    assert_eq!(payment.payment_resource.as_deref(), Some(first.id.as_str()));
}

#[tokio::test]
async fn test_declined_charge_recorded_and_sale_cancellable() {
    let Some(db) = test_db().await else { return };
    let gateway = Arc::new(MockGateway::new());
    let workflow = sale_workflow(&db, gateway.clone());

    let company = seed_company(&db).await;
    let route = seed_route(&db, company, &[]).await;
    let (t1, b1, a1) = seed_trip(&db, route, dec!(15.00), 10).await;

    let prepared = workflow
        .prepare_ticket_sale(sale_input(vec![order(t1, b1, a1, Uuid::now_v7())]))
        .await
        .expect("sale");

    gateway.fail_next(farebox_core::payment::GatewayError::Declined(
        "card_declined".to_string(),
    ));
    let err = workflow
        .charge_sale(ChargeSaleArgs {
            transaction_id: prepared.transaction_id,
            payment_id: prepared.payment_id,
            company_id: CompanyId::from_uuid(company),
            session_iat: 7,
            source: card(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 402);

    // Error recorded in-band on the payment row for triage.
    let payment = farebox_db::entities::payments::Entity::find_by_id(
        prepared.payment_id.into_inner(),
    )
    .one(&db)
    .await
    .unwrap()
    .unwrap();
    assert!(payment.data.unwrap()["error"]
        .as_str()
        .unwrap()
        .contains("card_declined"));

    // Gateway-decline recovery: cancel the sale.
    workflow
        .cancel_sale(prepared.transaction_id)
        .await
        .expect("cancel");
    let tx = tx_entities::Entity::find_by_id(prepared.transaction_id.into_inner())
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert!(!tx.committed);
    let ticket = tickets::Entity::find_by_id(prepared.ticket_ids[0].into_inner())
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ticket.status, sea_orm_active_enums::TicketStatus::Failed);

    // Cancelling twice fails: no longer committed.
    assert!(workflow.cancel_sale(prepared.transaction_id).await.is_err());
}

// ============================================================================
// Refunds
// ============================================================================

/// Books and charges one ticket at the given price (optionally with a
/// promo), returning (ticket, transaction, payment) ids.
async fn charged_sale(
    db: &DatabaseConnection,
    gateway: &Arc<MockGateway>,
    price: Decimal,
    promo_code: Option<&str>,
) -> (TicketId, Uuid, Uuid) {
    let workflow = sale_workflow(db, gateway.clone());
    let company = seed_company(db).await;
    let route = seed_route(db, company, &[]).await;
    let (t1, b1, a1) = seed_trip(db, route, price, 10).await;

    let mut input = sale_input(vec![order(t1, b1, a1, Uuid::now_v7())]);
    input.promo_code = promo_code.map(ToString::to_string);
    let prepared = workflow.prepare_ticket_sale(input).await.expect("sale");

    workflow
        .charge_sale(ChargeSaleArgs {
            transaction_id: prepared.transaction_id,
            payment_id: prepared.payment_id,
            company_id: CompanyId::from_uuid(company),
            session_iat: 42,
            source: card(),
        })
        .await
        .expect("charge")
        .expect("nonzero charge");

    (
        prepared.ticket_ids[0],
        prepared.transaction_id.into_inner(),
        prepared.payment_id.into_inner(),
    )
}

fn admin_credentials() -> farebox_core::auth::Credentials {
    farebox_core::auth::Credentials {
        scope: farebox_core::ledger::CreatorScope::Admin,
        admin_id: Some(Uuid::now_v7()),
        email: Some("ops@amber.example".to_string()),
        driver_id: None,
    }
}

#[tokio::test]
async fn test_partial_refund_violates_all_or_nothing() {
    let Some(db) = test_db().await else { return };
    let gateway = Arc::new(MockGateway::new());
    let code = seed_promo(
        &db,
        "TWO-OFF",
        json!({ "type": "fixed", "amount": "2.00" }),
        sea_orm_active_enums::PromoScope::Ticket,
    )
    .await;
    let (ticket_id, _, _) = charged_sale(&db, &gateway, dec!(10.00), Some(&code)).await;

    let refunds = refund_workflow(&db, gateway);
    let err = refunds
        .refund_ticket_sale(TicketRefundInput {
            ticket_id,
            target_amount: dec!(7.00),
            credentials: admin_credentials(),
        })
        .await
        .unwrap_err();
    assert!(
        err.to_string()
            .contains("requires requested refund to equal ticket value after discounts"),
        "got: {err}"
    );
}

#[tokio::test]
async fn test_full_refund_flow() {
    let Some(db) = test_db().await else { return };
    let gateway = Arc::new(MockGateway::new());
    let (ticket_id, sale_tx, _) = charged_sale(&db, &gateway, dec!(10.00), None).await;

    let refunds = refund_workflow(&db, gateway.clone());
    let outcome = refunds
        .refund_ticket_sale(TicketRefundInput {
            ticket_id,
            target_amount: dec!(10.00),
            credentials: admin_credentials(),
        })
        .await
        .expect("refund");

    // Balanced refund journal, typed refundPayment.
    assert_eq!(
        outcome.transaction.transaction.transaction_type,
        sea_orm_active_enums::TransactionType::RefundPayment
    );
    let debit: Decimal = outcome.transaction.items.iter().map(|i| i.debit_amount()).sum();
    let credit: Decimal = outcome.transaction.items.iter().map(|i| i.credit_amount()).sum();
    assert_eq!(debit, credit);

    // Ticket refunded, original transaction recorded on its notes.
    let ticket = tickets::Entity::find_by_id(ticket_id.into_inner())
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ticket.status, sea_orm_active_enums::TicketStatus::Refunded);
    assert_eq!(
        ticket.notes["refundedTransactionId"],
        json!(sale_tx.to_string())
    );

    // Gateway saw exactly one refund for the full amount.
    assert_eq!(gateway.refund_calls(), 1);
    assert_eq!(outcome.refund_info.amount, dec!(10.00));
    assert_eq!(outcome.refund_info.balance_amt_cents, 1000);

    // A second full refund is rejected: nothing refundable remains.
    let refunds2 = refund_workflow(&db, gateway);
    let err = refunds2
        .refund_ticket_sale(TicketRefundInput {
            ticket_id,
            target_amount: dec!(10.00),
            credentials: admin_credentials(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 422);

    // Undo restores the pre-refund ticket status.
    outcome.undo.run(&db).await.expect("undo");
    let restored = tickets::Entity::find_by_id(ticket_id.into_inner())
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(restored.status, sea_orm_active_enums::TicketStatus::Valid);
}

#[tokio::test]
async fn test_refund_denied_without_admin_role() {
    let Some(db) = test_db().await else { return };
    let gateway = Arc::new(MockGateway::new());
    let (ticket_id, _, _) = charged_sale(&db, &gateway, dec!(10.00), None).await;

    let refunds = RefundWorkflow::new(
        db.clone(),
        gateway,
        Arc::new(farebox_core::auth::DenyAll),
        gateway_config(),
    );
    let err = refunds
        .refund_ticket_sale(TicketRefundInput {
            ticket_id,
            target_amount: dec!(10.00),
            credentials: admin_credentials(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);

    // Denied refund leaves the ticket untouched.
    let ticket = tickets::Entity::find_by_id(ticket_id.into_inner())
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ticket.status, sea_orm_active_enums::TicketStatus::Valid);
}

#[tokio::test]
async fn test_route_pass_refund() {
    let Some(db) = test_db().await else { return };
    let gateway = Arc::new(MockGateway::new());

    // Purchase two passes, then charge the purchase.
    let purchase_workflow = RoutePassPurchaseWorkflow::new(db.clone());
    let sale = sale_workflow(&db, gateway.clone());
    let company = seed_company(&db).await;
    let route = seed_route(&db, company, &["amber"]).await;
    let _ = seed_trip(&db, route, dec!(5.00), 10).await;

    let purchase = purchase_workflow
        .purchase_route_pass(
            RoutePassPurchaseInput {
                user_id: UserId::from_uuid(Uuid::now_v7()),
                company_id: CompanyId::from_uuid(company),
                tag: "amber".to_string(),
                quantity: Some(2),
                value: None,
                promo_code: None,
                dry_run: false,
                expected_price: None,
                creator: Creator::system(),
                expires_at: None,
            },
            None,
        )
        .await
        .expect("purchase");
    sale.charge_sale(ChargeSaleArgs {
        transaction_id: purchase.transaction_id,
        payment_id: purchase.payment_id,
        company_id: CompanyId::from_uuid(company),
        session_iat: 9,
        source: card(),
    })
    .await
    .expect("charge")
    .expect("nonzero");

    let refunds = refund_workflow(&db, gateway);
    let outcome = refunds
        .refund_route_pass(RoutePassRefundInput {
            pass_id: purchase.pass_ids[0],
            target_amount: dec!(5.00),
            credentials: admin_credentials(),
        })
        .await
        .expect("refund");
    assert_eq!(outcome.refund_info.amount, dec!(5.00));

    let pass = route_passes::Entity::find_by_id(purchase.pass_ids[0].into_inner())
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pass.status, sea_orm_active_enums::RoutePassStatus::Refunded);

    // The sibling pass is untouched.
    let sibling = route_passes::Entity::find_by_id(purchase.pass_ids[1].into_inner())
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sibling.status, sea_orm_active_enums::RoutePassStatus::Valid);
}
