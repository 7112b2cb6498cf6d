use std::io::Read;
use std::pin::Pin;

use futures::stream::{self, Stream};
use serde::Deserialize;

use crate::domain::traits::CommandStream;
use crate::domain::{Command, CommandKind, Error, MerchantId, Money};

pub struct CsvReader<R: Read> {
    reader: Option<csv::Reader<R>>,
}

impl<R: Read> CsvReader<R> {
    pub fn new(reader: R) -> Result<Self, Error> {
        let rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        Ok(Self { reader: Some(rdr) })
    }
}

/// Internal shape used only for CSV deserialization.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    card: Option<String>,
    #[serde(default)]
    merchant: Option<String>,
    #[serde(default)]
    tx: Option<String>,
    #[serde(default)]
    amount: Option<String>,
}

fn non_empty(field: Option<String>) -> Option<String> {
    field.filter(|s| !s.is_empty())
}

fn parse_amount(raw: Option<String>, kind: &str) -> Result<Money, Error> {
    let raw = non_empty(raw)
        .ok_or_else(|| Error::Ingestion(format!("{} requires an amount", kind)))?;
    Money::from_decimal_str(&raw)
        .ok_or_else(|| Error::Ingestion(format!("Invalid amount: {}", raw)))
}

fn require(field: Option<String>, name: &str, kind: &str) -> Result<String, Error> {
    field.ok_or_else(|| Error::Ingestion(format!("{} requires a {} alias", kind, name)))
}

impl TryFrom<CsvRow> for Command {
    type Error = Error;

    fn try_from(row: CsvRow) -> Result<Self, Self::Error> {
        let card = non_empty(row.card);
        let tx = non_empty(row.tx);
        let name = row.kind.trim().to_ascii_lowercase();

        let kind = match name.as_str() {
            "create" => {
                require(card.clone(), "card", &name)?;
                CommandKind::CreateCard
            }
            "load" => {
                require(card.clone(), "card", &name)?;
                CommandKind::Load {
                    amount: parse_amount(row.amount, &name)?,
                }
            }
            "authorize" => {
                require(card.clone(), "card", &name)?;
                require(tx.clone(), "tx", &name)?;
                let merchant = non_empty(row.merchant)
                    .ok_or_else(|| Error::Ingestion("authorize requires a merchant".to_string()))?;
                CommandKind::Authorize {
                    merchant: MerchantId(merchant),
                    amount: parse_amount(row.amount, &name)?,
                }
            }
            "capture" | "reverse" | "refund" => {
                require(tx.clone(), "tx", &name)?;
                let amount = parse_amount(row.amount, &name)?;
                match name.as_str() {
                    "capture" => CommandKind::Capture { amount },
                    "reverse" => CommandKind::Reverse { amount },
                    _ => CommandKind::Refund { amount },
                }
            }
            other => {
                return Err(Error::Ingestion(format!(
                    "Invalid command type: {}",
                    other
                )));
            }
        };

        Ok(Command { kind, card, tx })
    }
}

impl<R: Read + Send + 'static> CommandStream for CsvReader<R> {
    type CmdStream = Pin<Box<dyn Stream<Item = Result<Command, Error>> + Send>>;

    fn stream(&mut self) -> Self::CmdStream {
        // Take ownership of the reader so the iterator we build owns all data and is 'static.
        let reader = match self.reader.take() {
            Some(r) => r,
            None => {
                // Already consumed; return an empty stream.
                return Box::pin(stream::iter(Vec::<Result<Command, Error>>::new()));
            }
        };

        let iter = reader
            .into_deserialize::<CsvRow>()
            .map(|row_res| match row_res {
                Ok(row) => Command::try_from(row),
                Err(e) => Err(Error::Ingestion(format!(
                    "CSV deserialization error: {}",
                    e
                ))),
            });

        Box::pin(stream::iter(iter))
    }
}
