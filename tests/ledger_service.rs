use prepaid_ledger::ids::is_valid_card_number;
use prepaid_ledger::{
    CardNumber, Config, Error, IdGenerator, InMemoryStore, LedgerService, Merchant, MerchantId,
    Money, TransactionId,
};

fn ledger_with(config: &Config) -> LedgerService<InMemoryStore> {
    LedgerService::new(InMemoryStore::new(config.lock_timeout()), config)
}

async fn ledger() -> LedgerService<InMemoryStore> {
    let config = Config::default();
    let ledger = ledger_with(&config);
    ledger.seed_merchants(&config.merchants).await.unwrap();
    ledger
}

async fn funded_card(ledger: &LedgerService<InMemoryStore>, amount: i64) -> CardNumber {
    let card = ledger.create_card().await.unwrap();
    ledger
        .load_funds(&card.card_number, Money(amount))
        .await
        .unwrap();
    card.card_number
}

fn amazon() -> MerchantId {
    MerchantId::from("amazon")
}

async fn balances(ledger: &LedgerService<InMemoryStore>, card: &CardNumber) -> (i64, i64) {
    let card = ledger.get_card(card).await.unwrap();
    (card.full_balance.0, card.blocked_balance.0)
}

async fn amounts(ledger: &LedgerService<InMemoryStore>, tx: &TransactionId) -> (i64, i64) {
    let tx = ledger.get_transaction(tx).await.unwrap();
    (tx.authorized_amount.0, tx.captured_amount.0)
}

#[tokio::test]
async fn created_card_is_empty_and_readable() {
    let ledger = ledger().await;
    let card = ledger.create_card().await.unwrap();

    assert!(is_valid_card_number(&card.card_number));
    assert_eq!(card.full_balance, Money::ZERO);
    assert_eq!(card.blocked_balance, Money::ZERO);
    assert_eq!(ledger.get_card(&card.card_number).await.unwrap(), card);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let ledger = ledger().await;
    let missing_card = CardNumber::from("4111111111111111");
    let missing_tx: TransactionId = "0190a0b0-0000-7000-8000-000000000000".parse().unwrap();

    assert!(matches!(
        ledger.get_card(&missing_card).await,
        Err(Error::NotFound { entity: "card", .. })
    ));
    assert!(matches!(
        ledger.load_funds(&missing_card, Money(10)).await,
        Err(Error::NotFound { .. })
    ));
    assert!(matches!(
        ledger.get_transaction(&missing_tx).await,
        Err(Error::NotFound { entity: "transaction", .. })
    ));
    assert!(matches!(
        ledger.capture(&missing_tx, Money(1)).await,
        Err(Error::NotFound { .. })
    ));
    assert!(matches!(
        ledger.reverse(&missing_tx, Money(1)).await,
        Err(Error::NotFound { .. })
    ));
    assert!(matches!(
        ledger.refund(&missing_tx, Money(1)).await,
        Err(Error::NotFound { .. })
    ));
    assert!(matches!(
        ledger.get_merchant(&MerchantId::from("nowhere")).await,
        Err(Error::NotFound { entity: "merchant", .. })
    ));
}

#[tokio::test]
async fn load_funds_accumulates_positive_amounts() {
    let ledger = ledger().await;
    let card = funded_card(&ledger, 700).await;
    let loaded = ledger.load_funds(&card, Money(300)).await.unwrap();
    assert_eq!(loaded.full_balance, Money(1000));

    for amount in [0, -5] {
        assert!(matches!(
            ledger.load_funds(&card, Money(amount)).await,
            Err(Error::InvalidAmount(_))
        ));
    }
    assert_eq!(balances(&ledger, &card).await, (1000, 0));
}

#[tokio::test]
async fn authorize_places_hold() {
    let ledger = ledger().await;
    let card = funded_card(&ledger, 1000).await;

    let tx = ledger.authorize(&card, &amazon(), Money(300)).await.unwrap();
    assert_eq!(tx.original_amount, Money(300));
    assert_eq!(tx.authorized_amount, Money(300));
    assert_eq!(tx.captured_amount, Money::ZERO);
    assert_eq!(tx.card_id, card);
    assert_eq!(balances(&ledger, &card).await, (1000, 300));
}

#[tokio::test]
async fn rejected_authorize_leaves_no_trace() {
    let ledger = ledger().await;
    let card = funded_card(&ledger, 100).await;

    assert!(matches!(
        ledger.authorize(&card, &amazon(), Money(101)).await,
        Err(Error::InsufficientBalance {
            requested: Money(101),
            spendable: Money(100)
        })
    ));
    assert!(matches!(
        ledger.authorize(&card, &amazon(), Money(0)).await,
        Err(Error::InvalidAmount(_))
    ));
    assert!(matches!(
        ledger
            .authorize(&card, &MerchantId::from("nowhere"), Money(10))
            .await,
        Err(Error::NotFound { entity: "merchant", .. })
    ));
    assert!(matches!(
        ledger
            .authorize(&CardNumber::from("4111111111111111"), &amazon(), Money(10))
            .await,
        Err(Error::NotFound { entity: "card", .. })
    ));

    assert_eq!(balances(&ledger, &card).await, (100, 0));
    assert!(ledger.transaction_list(&card).await.unwrap().is_empty());
}

#[tokio::test]
async fn example_lifecycle() {
    let ledger = ledger().await;
    let card = funded_card(&ledger, 1000).await;

    let t1 = ledger.authorize(&card, &amazon(), Money(300)).await.unwrap();
    assert_eq!(balances(&ledger, &card).await, (1000, 300));

    let after_capture = ledger.capture(&t1.id, Money(200)).await.unwrap();
    assert_eq!(after_capture.authorized_amount, Money(100));
    assert_eq!(after_capture.captured_amount, Money(200));
    assert_eq!(balances(&ledger, &card).await, (800, 100));

    ledger.reverse(&t1.id, Money(100)).await.unwrap();
    assert_eq!(amounts(&ledger, &t1.id).await, (0, 200));
    assert_eq!(balances(&ledger, &card).await, (800, 0));

    ledger.refund(&t1.id, Money(200)).await.unwrap();
    assert_eq!(amounts(&ledger, &t1.id).await, (0, 0));
    assert_eq!(balances(&ledger, &card).await, (1000, 0));
}

#[tokio::test]
async fn full_round_trip_restores_balances() {
    let ledger = ledger().await;
    let card = funded_card(&ledger, 500).await;
    let other = ledger.authorize(&card, &amazon(), Money(50)).await.unwrap();
    let before = balances(&ledger, &card).await;

    let tx = ledger.authorize(&card, &amazon(), Money(100)).await.unwrap();
    ledger.capture(&tx.id, Money(100)).await.unwrap();
    ledger.refund(&tx.id, Money(100)).await.unwrap();

    assert_eq!(balances(&ledger, &card).await, before);
    assert_eq!(amounts(&ledger, &other.id).await, (50, 0));
}

#[tokio::test]
async fn capture_and_reverse_reject_out_of_range_amounts() {
    let ledger = ledger().await;
    let card = funded_card(&ledger, 1000).await;
    let tx = ledger.authorize(&card, &amazon(), Money(300)).await.unwrap();

    for amount in [0, -1, 301] {
        assert!(matches!(
            ledger.capture(&tx.id, Money(amount)).await,
            Err(Error::InvalidAuthorizedAmount { .. })
        ));
        assert!(matches!(
            ledger.reverse(&tx.id, Money(amount)).await,
            Err(Error::InvalidAuthorizedAmount { .. })
        ));
    }

    assert_eq!(amounts(&ledger, &tx.id).await, (300, 0));
    assert_eq!(balances(&ledger, &card).await, (1000, 300));
}

#[tokio::test]
async fn refund_rejects_more_than_captured() {
    let ledger = ledger().await;
    let card = funded_card(&ledger, 1000).await;
    let tx = ledger.authorize(&card, &amazon(), Money(300)).await.unwrap();
    ledger.capture(&tx.id, Money(100)).await.unwrap();

    assert!(matches!(
        ledger.refund(&tx.id, Money(101)).await,
        Err(Error::InvalidCapturedAmount {
            requested: Money(101),
            captured: Money(100)
        })
    ));
    assert_eq!(amounts(&ledger, &tx.id).await, (200, 100));
    assert_eq!(balances(&ledger, &card).await, (900, 200));

    let unchanged = ledger.refund(&tx.id, Money::ZERO).await.unwrap();
    assert_eq!(unchanged.captured_amount, Money(100));
}

#[tokio::test]
async fn exhausted_hold_still_accepts_refunds() {
    let ledger = ledger().await;
    let card = funded_card(&ledger, 1000).await;
    let tx = ledger.authorize(&card, &amazon(), Money(300)).await.unwrap();
    let tx = ledger.capture(&tx.id, Money(300)).await.unwrap();
    assert!(tx.is_closed());

    assert!(matches!(
        ledger.capture(&tx.id, Money(1)).await,
        Err(Error::InvalidAuthorizedAmount { .. })
    ));
    assert!(matches!(
        ledger.reverse(&tx.id, Money(1)).await,
        Err(Error::InvalidAuthorizedAmount { .. })
    ));

    ledger.refund(&tx.id, Money(120)).await.unwrap();
    ledger.refund(&tx.id, Money(180)).await.unwrap();
    assert_eq!(amounts(&ledger, &tx.id).await, (0, 0));
    assert_eq!(balances(&ledger, &card).await, (1000, 0));
}

#[tokio::test]
async fn transaction_list_is_newest_first() {
    let ledger = ledger().await;
    let card = funded_card(&ledger, 1000).await;
    let other = funded_card(&ledger, 1000).await;

    let first = ledger.authorize(&card, &amazon(), Money(100)).await.unwrap();
    let second = ledger
        .authorize(&card, &MerchantId::from("apple"), Money(200))
        .await
        .unwrap();
    ledger.authorize(&other, &amazon(), Money(50)).await.unwrap();
    ledger.capture(&first.id, Money(40)).await.unwrap();

    let list = ledger.transaction_list(&card).await.unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].transaction_id, second.id);
    assert_eq!(list[0].merchant_name, "Apple");
    assert_eq!(list[0].merchant_type, "Technology");
    assert_eq!(list[1].transaction_id, first.id);
    assert_eq!(list[1].original_amount, Money(100));
    assert_eq!(list[1].authorized_amount, Money(60));
    assert_eq!(list[1].captured_amount, Money(40));
    assert!(list[0].time >= list[1].time);

    let unknown = CardNumber::from("4111111111111111");
    assert!(ledger.transaction_list(&unknown).await.unwrap().is_empty());
}

#[tokio::test]
async fn merchants_are_unique() {
    let ledger = ledger().await;
    let created = ledger
        .create_merchant(Merchant::new("bakery", "Bakery", "Food & Drink", "Main Street"))
        .await
        .unwrap();
    assert_eq!(
        ledger.get_merchant(&created.id).await.unwrap().name,
        "Bakery"
    );

    assert!(matches!(
        ledger
            .create_merchant(Merchant::new("bakery", "Other", "Food & Drink", "Elsewhere"))
            .await,
        Err(Error::AlreadyExists { entity: "merchant", .. })
    ));
    assert_eq!(
        ledger
            .seed_merchants(&Config::default().merchants)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn card_number_exhaustion_is_a_generation_error() {
    let config = Config {
        card_number_attempts: 1,
        ..Config::default()
    };
    let store = InMemoryStore::new(config.lock_timeout());

    let first = LedgerService::with_ids(store.clone(), IdGenerator::from_seed(42), &config);
    let second = LedgerService::with_ids(store, IdGenerator::from_seed(42), &config);

    let card = first.create_card().await.unwrap();
    let err = second.create_card().await.unwrap_err();
    assert!(matches!(err, Error::Generation(_)));
    assert!(!err.is_retryable());

    assert_eq!(second.get_card(&card.card_number).await.unwrap(), card);
}
