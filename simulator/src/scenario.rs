//! Simulation scenarios.

use clap::ValueEnum;
use rand::Rng;
use rust_decimal::Decimal;

use pairledger_common::{AccountId, Money, TransferRequest};

/// Built-in transfer patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScenarioKind {
    /// Two accounts, half the workers moving money each way.
    PingPong,
    /// Worker `i` moves money from account `i` to account `i + 1`, wrapping
    /// around, so lock requests form a cycle.
    Ring,
    /// Random distinct pairs and random amounts.
    Random,
}

/// A simulation scenario: one list of transfers per worker.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Scenario name.
    pub name: &'static str,
    /// Description.
    pub description: &'static str,
    /// Transfers each worker submits, in order.
    pub workers: Vec<Vec<TransferRequest>>,
}

impl Scenario {
    /// Build a scenario over `accounts`.
    pub fn build<R: Rng>(
        kind: ScenarioKind,
        accounts: &[AccountId],
        workers: usize,
        transfers_per_worker: usize,
        max_amount: Money,
        rng: &mut R,
    ) -> anyhow::Result<Self> {
        if accounts.len() < 2 {
            anyhow::bail!("Scenario needs at least 2 accounts, got {}", accounts.len());
        }
        if workers == 0 {
            anyhow::bail!("Scenario needs at least one worker");
        }

        let unit = Money::from(1);
        let scenario = match kind {
            ScenarioKind::PingPong => {
                let (x, y) = (accounts[0], accounts[1]);
                Self {
                    name: "ping-pong",
                    description: "Opposite transfers between two accounts",
                    workers: (0..workers)
                        .map(|worker| {
                            let (from, to) = if worker % 2 == 0 { (x, y) } else { (y, x) };
                            vec![TransferRequest::new(from, to, unit); transfers_per_worker]
                        })
                        .collect(),
                }
            }
            ScenarioKind::Ring => Self {
                name: "ring",
                description: "Each account pays the next one, closing a cycle",
                workers: (0..workers)
                    .map(|worker| {
                        let from = accounts[worker % accounts.len()];
                        let to = accounts[(worker + 1) % accounts.len()];
                        vec![TransferRequest::new(from, to, unit); transfers_per_worker]
                    })
                    .collect(),
            },
            ScenarioKind::Random => {
                let max_cents = cents(max_amount)?;
                Self {
                    name: "random",
                    description: "Random pairs with random amounts",
                    workers: (0..workers)
                        .map(|_| {
                            (0..transfers_per_worker)
                                .map(|_| random_transfer(accounts, max_cents, rng))
                                .collect()
                        })
                        .collect(),
                }
            }
        };

        Ok(scenario)
    }

    /// Total number of transfers across workers.
    pub fn transfer_count(&self) -> usize {
        self.workers.iter().map(Vec::len).sum()
    }
}

/// `amount` in hundredths, at least 1.
fn cents(amount: Money) -> anyhow::Result<i64> {
    let scaled = (amount.value() * Decimal::ONE_HUNDRED).trunc();
    let cents = i64::try_from(scaled)
        .map_err(|_| anyhow::anyhow!("Maximum amount out of range: {}", amount))?;
    if cents < 1 {
        anyhow::bail!("Maximum amount must be at least 0.01, got {}", amount);
    }
    Ok(cents)
}

fn random_transfer<R: Rng>(accounts: &[AccountId], max_cents: i64, rng: &mut R) -> TransferRequest {
    let from = rng.gen_range(0..accounts.len());
    let mut to = rng.gen_range(0..accounts.len() - 1);
    if to >= from {
        to += 1;
    }
    let amount = Money::new(Decimal::new(rng.gen_range(1..=max_cents), 2));
    TransferRequest::new(accounts[from], accounts[to], amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn accounts(n: i64) -> Vec<AccountId> {
        (1..=n).map(AccountId::new).collect()
    }

    #[test]
    fn test_ring_closes_cycle() {
        let mut rng = StdRng::seed_from_u64(7);
        let scenario = Scenario::build(
            ScenarioKind::Ring,
            &accounts(4),
            4,
            3,
            Money::from(1),
            &mut rng,
        )
        .unwrap();

        assert_eq!(scenario.transfer_count(), 12);
        let edges: Vec<(i64, i64)> = scenario
            .workers
            .iter()
            .map(|steps| (steps[0].source_account_id.get(), steps[0].destination_account_id.get()))
            .collect();
        assert_eq!(edges, vec![(1, 2), (2, 3), (3, 4), (4, 1)]);
    }

    #[test]
    fn test_ping_pong_alternates_direction() {
        let mut rng = StdRng::seed_from_u64(7);
        let scenario = Scenario::build(
            ScenarioKind::PingPong,
            &accounts(2),
            2,
            5,
            Money::from(1),
            &mut rng,
        )
        .unwrap();

        assert_eq!(scenario.workers[0][0].source_account_id, AccountId::new(1));
        assert_eq!(scenario.workers[1][0].source_account_id, AccountId::new(2));
    }

    #[test]
    fn test_random_pairs_are_distinct_and_bounded() {
        let mut rng = StdRng::seed_from_u64(42);
        let max = Money::new(Decimal::new(2500, 2));
        let scenario =
            Scenario::build(ScenarioKind::Random, &accounts(3), 3, 200, max, &mut rng).unwrap();

        for transfer in scenario.workers.iter().flatten() {
            assert!(!transfer.is_self_transfer());
            assert!(transfer.amount.is_positive());
            assert!(transfer.amount <= max);
        }
    }

    #[test]
    fn test_rejects_degenerate_input() {
        let mut rng = StdRng::seed_from_u64(1);
        let one = Money::from(1);
        let mut build = |kind, n, workers, max| {
            Scenario::build(kind, &accounts(n), workers, 1, max, &mut rng)
        };

        assert!(build(ScenarioKind::Ring, 1, 1, one).is_err());
        assert!(build(ScenarioKind::Ring, 2, 0, one).is_err());
        assert!(build(ScenarioKind::Random, 2, 1, Money::ZERO).is_err());
    }
}
