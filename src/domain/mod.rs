pub mod card;
pub mod command;
pub mod error;
pub mod merchant;
pub mod money;
pub mod traits;
pub mod transaction;

pub use card::{Card, CardNumber};
pub use command::{Command, CommandKind};
pub use error::Error;
pub use merchant::{Merchant, MerchantId};
pub use money::Money;
pub use traits::{CommandStream, DeadLetterQueue, LedgerStore, LedgerUnit};
pub use transaction::{Spending, Transaction, TransactionId};
