//! An in-process ledger that behaves like a single-validator devnet.
//!
//! `SimLedger` holds balances and program-owned accounts, produces a new
//! blockhash per block, verifies ed25519 signatures, charges fees, and runs
//! the three programs WARDEN agents call: system transfer, memo, and the
//! per-agent counter. Transactions are atomic: an instruction failure leaves
//! every account untouched.
//!
//! Tests can count calls per method and inject one-shot faults.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
};

use async_trait::async_trait;
use ed25519_dalek::{Signature as DalekSignature, VerifyingKey};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use warden_contracts::{
    address::{Address, MEMO_PROGRAM_ID, SYSTEM_PROGRAM_ID},
    error::LedgerError,
    ledger::{AccountInfo, Commitment, Ledger, SimulationReport},
    transaction::{AccountMeta, Blockhash, FreshnessAnchor, Instruction, SignedTransaction},
};
use warden_program::{
    discriminator::{account_discriminator, instruction_discriminator, DISCRIMINATOR_LEN},
    system, CounterAccount, CounterClient, COUNTER_ACCOUNT_NAME, COUNTER_PROGRAM_ID,
};

/// Charged to the fee payer for every signature, success or not.
pub const FEE_PER_SIGNATURE: u64 = 5_000;

/// Blocks after which a blockhash is no longer accepted.
pub const BLOCKHASH_VALIDITY: u64 = 150;

/// Rent-exempt minimum for a 48-byte counter account.
pub const COUNTER_RENT_LAMPORTS: u64 = 1_224_960;

const SYSTEM_UNITS: u64 = 150;
const MEMO_UNITS: u64 = 2_000;
const COUNTER_UNITS: u64 = 5_000;

// ── State ─────────────────────────────────────────────────────────────────────

struct State {
    accounts: HashMap<Address, AccountInfo>,
    height: u64,
    latest: Blockhash,
    /// Every blockhash still tracked, with the last height it is valid at.
    blockhashes: HashMap<Blockhash, u64>,
    /// Landed transaction ids and the height they landed at.
    landed: HashMap<String, u64>,
}

impl State {
    fn genesis() -> Self {
        let latest = blockhash_at(0);
        Self {
            accounts: HashMap::new(),
            height: 0,
            latest,
            blockhashes: HashMap::from([(latest, BLOCKHASH_VALIDITY)]),
            landed: HashMap::new(),
        }
    }

    fn produce_block(&mut self) {
        self.height += 1;
        self.latest = blockhash_at(self.height);
        self.blockhashes.insert(self.latest, self.height + BLOCKHASH_VALIDITY);
        let height = self.height;
        self.blockhashes.retain(|_, last_valid| *last_valid >= height);
    }

    fn anchor(&self) -> FreshnessAnchor {
        FreshnessAnchor {
            blockhash: self.latest,
            last_valid_block_height: self.height + BLOCKHASH_VALIDITY,
        }
    }

    /// Checks that do not depend on account state.
    fn verify(&self, tx: &SignedTransaction) -> Result<(), String> {
        let message = tx.message();
        match self.blockhashes.get(&message.recent_blockhash) {
            Some(&last_valid) if last_valid >= self.height => {}
            _ => return Err("Blockhash not found".to_string()),
        }

        let required = usize::from(message.header.num_required_signatures);
        if required == 0 || tx.signatures().len() != required || message.account_keys.len() < required {
            return Err(format!(
                "expected {required} signature(s), got {}",
                tx.signatures().len()
            ));
        }
        let bytes = message.serialize();
        for (signature, key) in tx.signatures().iter().zip(&message.account_keys) {
            let verifying = VerifyingKey::from_bytes(key.as_bytes())
                .map_err(|_| format!("signer {key} is not a valid ed25519 public key"))?;
            verifying
                .verify_strict(&bytes, &DalekSignature::from_bytes(signature.as_bytes()))
                .map_err(|_| "Transaction signature verification failure".to_string())?;
        }

        if self.landed.contains_key(&tx.id()) {
            return Err("This transaction has already been processed".to_string());
        }
        Ok(())
    }
}

fn blockhash_at(height: u64) -> Blockhash {
    let digest: [u8; 32] = Sha256::new()
        .chain_update(b"warden-devnet")
        .chain_update(height.to_le_bytes())
        .finalize()
        .into();
    Blockhash(digest)
}

// ── Execution ─────────────────────────────────────────────────────────────────

/// Runs one transaction against a scratch copy of the accounts.
struct Runtime {
    accounts: HashMap<Address, AccountInfo>,
    logs: Vec<String>,
    units: u64,
}

struct Failure {
    reason: String,
    logs: Vec<String>,
}

impl Runtime {
    fn new(accounts: &HashMap<Address, AccountInfo>) -> Self {
        Self {
            accounts: accounts.clone(),
            logs: Vec::new(),
            units: 0,
        }
    }

    fn run(mut self, tx: &SignedTransaction) -> Result<Self, Failure> {
        let message = tx.message();
        let fee = FEE_PER_SIGNATURE * tx.signatures().len() as u64;
        let payer = message.fee_payer().copied().ok_or_else(|| Failure {
            reason: "transaction has no fee payer".to_string(),
            logs: Vec::new(),
        })?;
        if let Err(reason) = self.debit(&payer, fee) {
            return Err(Failure {
                reason: format!("Attempt to debit an account but found no record of a prior credit: {reason}"),
                logs: Vec::new(),
            });
        }

        for (index, compiled) in message.instructions.iter().enumerate() {
            let Some(ix) = message.resolve(compiled) else {
                return Err(self.fail(format!("instruction {index} references an unknown account")));
            };
            self.logs.push(format!("Program {} invoke [1]", ix.program_id));
            let result = if ix.program_id == SYSTEM_PROGRAM_ID {
                self.system_transfer(&ix)
            } else if ix.program_id == MEMO_PROGRAM_ID {
                self.memo(&ix)
            } else if ix.program_id == COUNTER_PROGRAM_ID {
                self.counter(&ix)
            } else {
                Err(format!("program {} is not deployed", ix.program_id))
            };
            match result {
                Ok(units) => {
                    self.units += units;
                    self.logs.push(format!("Program {} success", ix.program_id));
                }
                Err(e) => {
                    self.logs.push(format!("Program {} failed: {e}", ix.program_id));
                    return Err(self.fail(format!("Error processing Instruction {index}: {e}")));
                }
            }
        }
        Ok(self)
    }

    fn fail(self, reason: String) -> Failure {
        Failure {
            reason,
            logs: self.logs,
        }
    }

    fn lamports(&self, address: &Address) -> u64 {
        self.accounts.get(address).map_or(0, |a| a.lamports)
    }

    fn debit(&mut self, address: &Address, lamports: u64) -> Result<(), String> {
        let balance = self.lamports(address);
        match self.accounts.get_mut(address) {
            Some(account) if account.lamports >= lamports => {
                account.lamports -= lamports;
                Ok(())
            }
            _ => Err(format!("insufficient lamports {balance}, need {lamports}")),
        }
    }

    fn credit(&mut self, address: &Address, lamports: u64) -> Result<(), String> {
        let account = self.accounts.entry(*address).or_insert_with(|| AccountInfo {
            lamports: 0,
            owner: SYSTEM_PROGRAM_ID,
            data: Vec::new(),
        });
        account.lamports = account
            .lamports
            .checked_add(lamports)
            .ok_or_else(|| "arithmetic overflow".to_string())?;
        Ok(())
    }

    // ── System program ────────────────────────────────────────────────────────

    fn system_transfer(&mut self, ix: &Instruction) -> Result<u64, String> {
        let lamports = system::decode_transfer(&ix.data).ok_or("invalid instruction data")?;
        let [from, to] = ix.accounts.as_slice() else {
            return Err("transfer expects 2 accounts".to_string());
        };
        require_signer(from)?;
        if !from.is_writable || !to.is_writable {
            return Err("instruction requires a writable account".to_string());
        }
        self.debit(&from.address, lamports)
            .map_err(|e| format!("Transfer: {e}"))?;
        self.credit(&to.address, lamports)?;
        Ok(SYSTEM_UNITS)
    }

    // ── Memo program ──────────────────────────────────────────────────────────

    fn memo(&mut self, ix: &Instruction) -> Result<u64, String> {
        let text = std::str::from_utf8(&ix.data).map_err(|_| "invalid UTF-8 in memo".to_string())?;
        for meta in &ix.accounts {
            require_signer(meta)?;
        }
        self.logs
            .push(format!("Program log: Memo (len {}): {text:?}", ix.data.len()));
        Ok(MEMO_UNITS)
    }

    // ── Counter program ───────────────────────────────────────────────────────

    fn counter(&mut self, ix: &Instruction) -> Result<u64, String> {
        let discriminator = ix
            .data
            .get(..DISCRIMINATOR_LEN)
            .ok_or("InstructionDidNotDeserialize")?;
        if discriminator == instruction_discriminator("initialize") {
            self.logs.push("Program log: Instruction: Initialize".to_string());
            self.counter_initialize(ix)
        } else if discriminator == instruction_discriminator("increment") {
            self.logs.push("Program log: Instruction: Increment".to_string());
            self.counter_increment(ix)
        } else {
            Err("InstructionFallbackNotFound".to_string())
        }
    }

    /// Checks shared by both instructions; returns `(counter, authority)`.
    fn counter_accounts(ix: &Instruction, expected: usize) -> Result<(Address, Address), String> {
        if ix.accounts.len() < expected {
            return Err("AccountNotEnoughKeys".to_string());
        }
        let (counter, authority) = (&ix.accounts[0], &ix.accounts[1]);
        require_signer(authority)?;
        if !counter.is_writable {
            return Err("ConstraintMut".to_string());
        }
        let (pda, _) = CounterClient::new(COUNTER_PROGRAM_ID)
            .derive_pda(&authority.address)
            .map_err(|e| e.to_string())?;
        if pda != counter.address {
            return Err("ConstraintSeeds".to_string());
        }
        Ok((counter.address, authority.address))
    }

    fn counter_initialize(&mut self, ix: &Instruction) -> Result<u64, String> {
        let (counter, authority) = Self::counter_accounts(ix, 3)?;
        if ix.accounts[2].address != SYSTEM_PROGRAM_ID {
            return Err("InvalidProgramId".to_string());
        }
        if self.lamports(&counter) > 0 {
            return Err(format!("Allocate: account {counter} already in use"));
        }
        self.debit(&authority, COUNTER_RENT_LAMPORTS)
            .map_err(|e| format!("Transfer: {e}"))?;
        self.accounts.insert(
            counter,
            AccountInfo {
                lamports: COUNTER_RENT_LAMPORTS,
                owner: COUNTER_PROGRAM_ID,
                data: CounterAccount { authority, count: 0 }.to_bytes(),
            },
        );
        Ok(COUNTER_UNITS)
    }

    fn counter_increment(&mut self, ix: &Instruction) -> Result<u64, String> {
        let (counter, authority) = Self::counter_accounts(ix, 2)?;
        let account = self
            .accounts
            .get_mut(&counter)
            .filter(|a| a.owner == COUNTER_PROGRAM_ID)
            .ok_or("AccountNotInitialized")?;
        if account.data.len() != CounterAccount::LEN
            || account.data[..DISCRIMINATOR_LEN] != account_discriminator(COUNTER_ACCOUNT_NAME)
        {
            return Err("AccountDiscriminatorMismatch".to_string());
        }
        if account.data[DISCRIMINATOR_LEN..DISCRIMINATOR_LEN + 32] != *authority.as_bytes() {
            return Err("BadAuthority".to_string());
        }
        let count_bytes: [u8; 8] = account.data[DISCRIMINATOR_LEN + 32..]
            .try_into()
            .map_err(|_| "AccountDidNotDeserialize".to_string())?;
        let count = u64::from_le_bytes(count_bytes)
            .checked_add(1)
            .ok_or("Overflow")?;
        account.data[DISCRIMINATOR_LEN + 32..].copy_from_slice(&count.to_le_bytes());
        self.logs.push(format!("Program log: count = {count}"));
        Ok(COUNTER_UNITS)
    }
}

fn require_signer(meta: &AccountMeta) -> Result<(), String> {
    if meta.is_signer {
        Ok(())
    } else {
        Err(format!("missing required signature for {}", meta.address))
    }
}

// ── Call counting and fault injection ─────────────────────────────────────────

#[derive(Debug, Default)]
struct CallCounters {
    get_balance: AtomicUsize,
    get_account: AtomicUsize,
    latest_anchor: AtomicUsize,
    simulate: AtomicUsize,
    broadcast: AtomicUsize,
    confirm: AtomicUsize,
}

/// How often each `Ledger` method has been called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get_balance: usize,
    pub get_account: usize,
    pub latest_anchor: usize,
    pub simulate: usize,
    pub broadcast: usize,
    pub confirm: usize,
}

#[derive(Debug, Default)]
struct Faults {
    simulate: Option<String>,
    broadcast: Option<String>,
    drop_broadcast: bool,
}

// ── Public ledger ─────────────────────────────────────────────────────────────

/// The reference devnet. Safe to share between concurrently executing agents.
pub struct SimLedger {
    state: Mutex<State>,
    faults: Mutex<Faults>,
    calls: CallCounters,
}

impl Default for SimLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl SimLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::genesis()),
            faults: Mutex::new(Faults::default()),
            calls: CallCounters::default(),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Credit `lamports` out of thin air. Returns the new balance.
    pub fn airdrop(&self, address: &Address, lamports: u64) -> u64 {
        let mut state = self.state();
        let account = state.accounts.entry(*address).or_insert_with(|| AccountInfo {
            lamports: 0,
            owner: SYSTEM_PROGRAM_ID,
            data: Vec::new(),
        });
        account.lamports = account.lamports.saturating_add(lamports);
        let balance = account.lamports;
        debug!(%address, lamports, balance, "airdrop");
        balance
    }

    /// Overwrite an account. For setting up states programs cannot reach.
    pub fn set_account(&self, address: Address, account: AccountInfo) {
        self.state().accounts.insert(address, account);
    }

    pub fn account(&self, address: &Address) -> Option<AccountInfo> {
        self.state().accounts.get(address).cloned()
    }

    pub fn balance(&self, address: &Address) -> u64 {
        self.state().accounts.get(address).map_or(0, |a| a.lamports)
    }

    pub fn height(&self) -> u64 {
        self.state().height
    }

    /// Produce `blocks` empty blocks, aging every outstanding blockhash.
    pub fn advance_blocks(&self, blocks: u64) {
        let mut state = self.state();
        for _ in 0..blocks {
            state.produce_block();
        }
        debug!(height = state.height, "advanced blocks");
    }

    /// Number of transactions that have landed.
    pub fn transaction_count(&self) -> usize {
        self.state().landed.len()
    }

    pub fn calls(&self) -> CallCounts {
        let load = |counter: &AtomicUsize| counter.load(Ordering::SeqCst);
        CallCounts {
            get_balance: load(&self.calls.get_balance),
            get_account: load(&self.calls.get_account),
            latest_anchor: load(&self.calls.latest_anchor),
            simulate: load(&self.calls.simulate),
            broadcast: load(&self.calls.broadcast),
            confirm: load(&self.calls.confirm),
        }
    }

    /// The next `simulate` reports `reason` as an execution error.
    pub fn fail_next_simulation(&self, reason: impl Into<String>) {
        self.faults().simulate = Some(reason.into());
    }

    /// The next `broadcast` fails at the transport level.
    pub fn fail_next_broadcast(&self, reason: impl Into<String>) {
        self.faults().broadcast = Some(reason.into());
    }

    /// The next `broadcast` is accepted but the transaction never lands.
    pub fn drop_next_broadcast(&self) {
        self.faults().drop_broadcast = true;
    }
}

#[async_trait]
impl Ledger for SimLedger {
    async fn get_balance(&self, address: &Address) -> Result<u64, LedgerError> {
        self.calls.get_balance.fetch_add(1, Ordering::SeqCst);
        Ok(self.balance(address))
    }

    async fn get_account(&self, address: &Address) -> Result<Option<AccountInfo>, LedgerError> {
        self.calls.get_account.fetch_add(1, Ordering::SeqCst);
        Ok(self.account(address))
    }

    async fn latest_anchor(&self) -> Result<FreshnessAnchor, LedgerError> {
        self.calls.latest_anchor.fetch_add(1, Ordering::SeqCst);
        Ok(self.state().anchor())
    }

    async fn simulate(&self, tx: &SignedTransaction) -> Result<SimulationReport, LedgerError> {
        self.calls.simulate.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.faults().simulate.take() {
            return Ok(SimulationReport {
                error: Some(reason),
                ..SimulationReport::default()
            });
        }

        let state = self.state();
        if let Err(reason) = state.verify(tx) {
            return Ok(SimulationReport {
                error: Some(reason),
                ..SimulationReport::default()
            });
        }
        let report = match Runtime::new(&state.accounts).run(tx) {
            Ok(runtime) => SimulationReport {
                error: None,
                logs: runtime.logs,
                units_consumed: Some(runtime.units),
            },
            Err(failure) => SimulationReport {
                error: Some(failure.reason),
                logs: failure.logs,
                units_consumed: None,
            },
        };
        debug!(signature = %tx.id(), ok = report.is_ok(), "simulated");
        Ok(report)
    }

    async fn broadcast(&self, tx: &SignedTransaction) -> Result<String, LedgerError> {
        self.calls.broadcast.fetch_add(1, Ordering::SeqCst);
        let (fault, dropped) = {
            let mut faults = self.faults();
            (faults.broadcast.take(), std::mem::take(&mut faults.drop_broadcast))
        };
        if let Some(reason) = fault {
            return Err(LedgerError::Rpc(reason));
        }

        let mut state = self.state();
        state.verify(tx).map_err(LedgerError::Execution)?;
        let runtime = Runtime::new(&state.accounts)
            .run(tx)
            .map_err(|failure| LedgerError::Execution(failure.reason))?;

        let signature = tx.id();
        if dropped {
            warn!(%signature, "transaction dropped before landing");
            return Ok(signature);
        }
        state.accounts = runtime.accounts;
        state.produce_block();
        let height = state.height;
        state.landed.insert(signature.clone(), height);
        info!(%signature, height, units = runtime.units, "transaction landed");
        Ok(signature)
    }

    async fn confirm(
        &self,
        signature: &str,
        anchor: &FreshnessAnchor,
        commitment: Commitment,
    ) -> Result<(), LedgerError> {
        self.calls.confirm.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        if let Some(height) = state.landed.get(signature) {
            debug!(%signature, height, %commitment, "confirmed");
            return Ok(());
        }
        // Nothing else will land it; let the anchor run out as a real
        // cluster would while the client polls.
        while state.height <= anchor.last_valid_block_height {
            state.produce_block();
        }
        Err(LedgerError::BlockhashExpired {
            last_valid_block_height: anchor.last_valid_block_height,
            current_height: state.height,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
