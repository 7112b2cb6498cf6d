use crate::domain::{MerchantId, Money};

/// A ledger command as read by the replay driver. Cards and transactions are
/// referred to by caller-chosen aliases because their real ids are generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    CreateCard,
    Load { amount: Money },
    Authorize { merchant: MerchantId, amount: Money },
    Capture { amount: Money },
    Reverse { amount: Money },
    Refund { amount: Money },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub card: Option<String>,
    pub tx: Option<String>,
}

impl core::fmt::Display for Command {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let card = self.card.as_deref().unwrap_or("-");
        let tx = self.tx.as_deref().unwrap_or("-");
        match &self.kind {
            CommandKind::CreateCard => write!(f, "create,card={}", card),
            CommandKind::Load { amount } => write!(f, "load,card={},amount={}", card, amount),
            CommandKind::Authorize { merchant, amount } => write!(
                f,
                "authorize,card={},merchant={},tx={},amount={}",
                card, merchant, tx, amount
            ),
            CommandKind::Capture { amount } => write!(f, "capture,tx={},amount={}", tx, amount),
            CommandKind::Reverse { amount } => write!(f, "reverse,tx={},amount={}", tx, amount),
            CommandKind::Refund { amount } => write!(f, "refund,tx={},amount={}", tx, amount),
        }
    }
}
