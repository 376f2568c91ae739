//! Client for the per-agent counter program.
//!
//! Each authority owns one counter account at the PDA derived from
//! `["counter", authority]`. `initialize` creates it with a zero count;
//! `increment` adds one. Neither instruction takes arguments.

use std::sync::Arc;

use tracing::debug;
use warden_contracts::{
    address::{Address, SYSTEM_PROGRAM_ID},
    error::{WardenError, WardenResult},
    ledger::Ledger,
    outcome::CounterAction,
    transaction::{AccountMeta, Instruction},
};

use crate::{
    discriminator::{account_discriminator, instruction_discriminator, DISCRIMINATOR_LEN},
    idl::ProgramIdl,
    pda::find_program_address,
    COUNTER_ACCOUNT_NAME, COUNTER_PROGRAM_ID, COUNTER_SEED,
};

/// Decoded state of one counter account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterAccount {
    pub authority: Address,
    pub count: u64,
}

impl CounterAccount {
    /// Discriminator, authority, count.
    pub const LEN: usize = DISCRIMINATOR_LEN + 32 + 8;

    /// Account data exactly as the program stores it.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(Self::LEN);
        data.extend_from_slice(&account_discriminator(COUNTER_ACCOUNT_NAME));
        data.extend_from_slice(self.authority.as_bytes());
        data.extend_from_slice(&self.count.to_le_bytes());
        data
    }
}

#[derive(Debug, Clone)]
pub struct CounterClient {
    program_id: Address,
    idl: Option<Arc<ProgramIdl>>,
}

impl CounterClient {
    /// A client without an IDL. It can derive addresses and encode
    /// instructions but cannot decode accounts.
    pub fn new(program_id: Address) -> Self {
        Self {
            program_id,
            idl: None,
        }
    }

    /// The deployed counter program with its embedded IDL.
    pub fn reference() -> WardenResult<Self> {
        Ok(Self::new(COUNTER_PROGRAM_ID).with_idl(ProgramIdl::embedded_counter()?))
    }

    pub fn with_idl(mut self, idl: ProgramIdl) -> Self {
        self.idl = Some(Arc::new(idl));
        self
    }

    pub fn program_id(&self) -> Address {
        self.program_id
    }

    /// The counter address for `authority` and its bump.
    pub fn derive_pda(&self, authority: &Address) -> WardenResult<(Address, u8)> {
        find_program_address(&[COUNTER_SEED, authority.as_bytes()], &self.program_id).ok_or_else(
            || WardenError::Wiring {
                reason: format!("no program address for authority {authority}"),
            },
        )
    }

    /// True iff `address` exists and is owned by this program.
    pub async fn account_exists(&self, ledger: &dyn Ledger, address: &Address) -> WardenResult<bool> {
        let exists = ledger
            .get_account(address)
            .await?
            .is_some_and(|account| account.owner == self.program_id);
        debug!(counter = %address, exists, "probed counter account");
        Ok(exists)
    }

    /// Build the instruction for `action` on `authority`'s counter.
    pub fn encode_instruction(
        &self,
        action: CounterAction,
        authority: &Address,
    ) -> WardenResult<Instruction> {
        let (counter, _) = self.derive_pda(authority)?;
        let mut accounts = vec![
            AccountMeta::writable(counter, false),
            AccountMeta::writable(*authority, true),
        ];
        if action == CounterAction::Initialize {
            accounts.push(AccountMeta::readonly(SYSTEM_PROGRAM_ID, false));
        }
        Ok(Instruction {
            program_id: self.program_id,
            accounts,
            data: instruction_discriminator(action.as_str()).to_vec(),
        })
    }

    /// Decode counter account data through the loaded IDL.
    pub fn decode_account(&self, data: &[u8]) -> WardenResult<CounterAccount> {
        let idl = self.idl.as_ref().ok_or_else(|| WardenError::Decode {
            reason: "no IDL loaded for the counter program".to_string(),
        })?;
        let fields = idl.decode_account(COUNTER_ACCOUNT_NAME, data)?;
        let authority = fields
            .get("authority")
            .and_then(|v| v.as_pubkey())
            .ok_or_else(|| WardenError::Decode {
                reason: "Counter.authority missing or not a public key".to_string(),
            })?;
        let count = fields
            .get("count")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| WardenError::Decode {
                reason: "Counter.count missing or not a u64".to_string(),
            })?;
        Ok(CounterAccount { authority, count })
    }

    /// Read `authority`'s counter, or `None` if it has not been initialized.
    pub async fn fetch_counter(
        &self,
        ledger: &dyn Ledger,
        authority: &Address,
    ) -> WardenResult<Option<CounterAccount>> {
        let (counter, _) = self.derive_pda(authority)?;
        let Some(account) = ledger.get_account(&counter).await? else {
            return Ok(None);
        };
        if account.owner != self.program_id {
            return Err(WardenError::Decode {
                reason: format!("account {counter} is owned by {}, not the counter program", account.owner),
            });
        }
        self.decode_account(&account.data).map(Some)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    use async_trait::async_trait;
    use warden_contracts::{
        error::LedgerError,
        ledger::{AccountInfo, Commitment, SimulationReport},
        transaction::{FreshnessAnchor, SignedTransaction},
    };

    use super::*;

    // ── Mock ledger ───────────────────────────────────────────────────────────

    #[derive(Default)]
    struct AccountsOnly {
        accounts: Arc<Mutex<HashMap<Address, AccountInfo>>>,
    }

    impl AccountsOnly {
        fn put(&self, address: Address, owner: Address, data: Vec<u8>) {
            self.accounts.lock().unwrap().insert(
                address,
                AccountInfo {
                    lamports: 1,
                    owner,
                    data,
                },
            );
        }
    }

    #[async_trait]
    impl Ledger for AccountsOnly {
        async fn get_balance(&self, _: &Address) -> Result<u64, LedgerError> {
            Ok(0)
        }
        async fn get_account(&self, address: &Address) -> Result<Option<AccountInfo>, LedgerError> {
            Ok(self.accounts.lock().unwrap().get(address).cloned())
        }
        async fn latest_anchor(&self) -> Result<FreshnessAnchor, LedgerError> {
            Err(LedgerError::Rpc("unused".into()))
        }
        async fn simulate(&self, _: &SignedTransaction) -> Result<SimulationReport, LedgerError> {
            Err(LedgerError::Rpc("unused".into()))
        }
        async fn broadcast(&self, _: &SignedTransaction) -> Result<String, LedgerError> {
            Err(LedgerError::Rpc("unused".into()))
        }
        async fn confirm(&self, _: &str, _: &FreshnessAnchor, _: Commitment) -> Result<(), LedgerError> {
            Err(LedgerError::Rpc("unused".into()))
        }
    }

    fn authority() -> Address {
        Address([1u8; 32])
    }

    // ── Instruction encoding ──────────────────────────────────────────────────

    #[test]
    fn initialize_includes_the_system_program() {
        let client = CounterClient::new(COUNTER_PROGRAM_ID);
        let (pda, _) = client.derive_pda(&authority()).unwrap();
        let ix = client.encode_instruction(CounterAction::Initialize, &authority()).unwrap();

        assert_eq!(ix.program_id, COUNTER_PROGRAM_ID);
        assert_eq!(ix.data, vec![175, 175, 109, 31, 13, 152, 155, 237]);
        assert_eq!(
            ix.accounts,
            vec![
                AccountMeta::writable(pda, false),
                AccountMeta::writable(authority(), true),
                AccountMeta::readonly(SYSTEM_PROGRAM_ID, false),
            ]
        );
    }

    #[test]
    fn increment_uses_counter_and_authority_only() {
        let client = CounterClient::new(COUNTER_PROGRAM_ID);
        let ix = client.encode_instruction(CounterAction::Increment, &authority()).unwrap();
        assert_eq!(ix.data, vec![11, 18, 104, 9, 104, 174, 59, 33]);
        assert_eq!(ix.accounts.len(), 2);
        assert_eq!(
            ix.accounts[0].address.to_base58(),
            "9bJq3FVGU2gg1E4yWP4n3rmLo1hwxq43QWQjbeA3d9ez"
        );
    }

    // ── Decoding ──────────────────────────────────────────────────────────────

    #[test]
    fn decode_requires_an_idl() {
        let bytes = CounterAccount { authority: authority(), count: 3 }.to_bytes();
        assert!(matches!(
            CounterClient::new(COUNTER_PROGRAM_ID).decode_account(&bytes),
            Err(WardenError::Decode { .. })
        ));

        let decoded = CounterClient::reference().unwrap().decode_account(&bytes).unwrap();
        assert_eq!(decoded, CounterAccount { authority: authority(), count: 3 });
        assert_eq!(bytes.len(), CounterAccount::LEN);
    }

    // ── Ledger reads ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn existence_requires_program_ownership() {
        let ledger = AccountsOnly::default();
        let client = CounterClient::reference().unwrap();
        let (pda, _) = client.derive_pda(&authority()).unwrap();

        assert!(!client.account_exists(&ledger, &pda).await.unwrap());
        ledger.put(pda, SYSTEM_PROGRAM_ID, vec![]);
        assert!(!client.account_exists(&ledger, &pda).await.unwrap());
        ledger.put(pda, COUNTER_PROGRAM_ID, vec![]);
        assert!(client.account_exists(&ledger, &pda).await.unwrap());
    }

    #[tokio::test]
    async fn fetch_counter_round_trip() {
        let ledger = AccountsOnly::default();
        let client = CounterClient::reference().unwrap();
        assert_eq!(client.fetch_counter(&ledger, &authority()).await.unwrap(), None);

        let (pda, _) = client.derive_pda(&authority()).unwrap();
        let state = CounterAccount { authority: authority(), count: 41 };
        ledger.put(pda, COUNTER_PROGRAM_ID, state.to_bytes());
        assert_eq!(client.fetch_counter(&ledger, &authority()).await.unwrap(), Some(state));

        ledger.put(pda, SYSTEM_PROGRAM_ID, state.to_bytes());
        assert!(matches!(
            client.fetch_counter(&ledger, &authority()).await,
            Err(WardenError::Decode { .. })
        ));
    }
}
