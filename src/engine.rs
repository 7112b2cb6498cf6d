use std::collections::BTreeMap;
use std::io::Write;

use futures::StreamExt;
use serde::Serialize;

use crate::domain::{
    CardNumber, Command, CommandKind, Error, TransactionId,
    traits::{CommandStream, DeadLetterQueue, LedgerStore},
};
use crate::service::LedgerService;

/// Replays a stream of commands against a ledger. Commands name cards and
/// transactions by alias; the engine maps aliases to the generated ids.
#[derive(Debug)]
pub struct Engine<I, S, D>
where
    I: CommandStream,
    S: LedgerStore,
    D: DeadLetterQueue,
{
    ingestion: I,
    ledger: LedgerService<S>,
    dlq: D,
    cards: BTreeMap<String, CardNumber>,
    transactions: BTreeMap<String, TransactionId>,
}

/// One row of the final report.
#[derive(Debug, Serialize)]
pub struct CardReport {
    pub card: String,
    pub full_balance: String,
    pub blocked_balance: String,
    pub spendable_balance: String,
    pub card_number: CardNumber,
}

impl<I, S, D> Engine<I, S, D>
where
    I: CommandStream,
    S: LedgerStore,
    D: DeadLetterQueue,
{
    pub fn new(ingestion: I, ledger: LedgerService<S>, dlq: D) -> Self {
        Self {
            ingestion,
            ledger,
            dlq,
            cards: BTreeMap::new(),
            transactions: BTreeMap::new(),
        }
    }

    pub fn dlq(&self) -> &D {
        &self.dlq
    }

    pub async fn process(&mut self) -> Result<(), Error> {
        let mut res = self.ingestion.stream();

        while let Some(cmd) = res.next().await {
            match cmd {
                Ok(cmd) => match self.apply_command(&cmd).await {
                    Ok(()) => {}
                    Err(e) => {
                        tracing::debug!(command = %cmd, "replay failed");
                        self.dlq.report(&e)
                    }
                },
                Err(e) => self.dlq.report(&e),
            }
        }

        Ok(())
    }

    async fn apply_command(&mut self, cmd: &Command) -> Result<(), Error> {
        match &cmd.kind {
            CommandKind::CreateCard => {
                let alias = alias(&cmd.card, "card")?;
                if self.cards.contains_key(alias) {
                    return Err(Error::Ingestion(format!("card alias {} already used", alias)));
                }
                let card = self.ledger.create_card().await?;
                self.cards.insert(alias.to_owned(), card.card_number);
            }
            CommandKind::Load { amount } => {
                let card = self.card(cmd)?;
                self.ledger.load_funds(&card, *amount).await?;
            }
            CommandKind::Authorize { merchant, amount } => {
                let card = self.card(cmd)?;
                let tx_alias = alias(&cmd.tx, "tx")?;
                if self.transactions.contains_key(tx_alias) {
                    return Err(Error::Ingestion(format!("tx alias {} already used", tx_alias)));
                }
                let transaction = self.ledger.authorize(&card, merchant, *amount).await?;
                self.transactions.insert(tx_alias.to_owned(), transaction.id);
            }
            CommandKind::Capture { amount } => {
                let tx = self.transaction(cmd)?;
                self.ledger.capture(&tx, *amount).await?;
            }
            CommandKind::Reverse { amount } => {
                let tx = self.transaction(cmd)?;
                self.ledger.reverse(&tx, *amount).await?;
            }
            CommandKind::Refund { amount } => {
                let tx = self.transaction(cmd)?;
                self.ledger.refund(&tx, *amount).await?;
            }
        }
        Ok(())
    }

    fn card(&self, cmd: &Command) -> Result<CardNumber, Error> {
        let alias = alias(&cmd.card, "card")?;
        self.cards
            .get(alias)
            .cloned()
            .ok_or_else(|| Error::Ingestion(format!("unknown card alias {}", alias)))
    }

    fn transaction(&self, cmd: &Command) -> Result<TransactionId, Error> {
        let alias = alias(&cmd.tx, "tx")?;
        self.transactions
            .get(alias)
            .copied()
            .ok_or_else(|| Error::Ingestion(format!("unknown tx alias {}", alias)))
    }

    /// Current balances of every card created by the replay, in alias order.
    pub async fn report(&self) -> Result<Vec<CardReport>, Error> {
        let mut rows = Vec::with_capacity(self.cards.len());
        for (alias, number) in &self.cards {
            let card = self.ledger.get_card(number).await?;
            rows.push(CardReport {
                card: alias.clone(),
                full_balance: card.full_balance.to_string(),
                blocked_balance: card.blocked_balance.to_string(),
                spendable_balance: card.spendable().to_string(),
                card_number: card.card_number,
            });
        }
        Ok(rows)
    }

    pub async fn flush<W: Write>(&self, out: W) -> Result<(), Error> {
        let mut writer = csv::Writer::from_writer(out);
        for row in self.report().await? {
            writer
                .serialize(row)
                .map_err(|e| Error::Ingestion(format!("CSV write error: {}", e)))?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn alias<'a>(field: &'a Option<String>, name: &str) -> Result<&'a str, Error> {
    field
        .as_deref()
        .ok_or_else(|| Error::Ingestion(format!("missing {} alias", name)))
}
