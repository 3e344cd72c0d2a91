use crate::portfolio::{BetPosition, PositionStatus};
use prettytable::{row, Table};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};

/// Summary statistics over the positions of a run.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct KpiSummary {
    /// Number of bets placed.
    pub total_bets: usize,
    /// Number of bets that have settled.
    pub settled_bets: usize,
    /// Win ratio over settled bets.
    pub win_rate: f64,
    /// Return on investment over settled bets.
    pub roi: f64,
    /// Average payout over settled bets.
    pub avg_payout: Decimal,
    /// Net profit over settled bets.
    pub total_profit: Decimal,
    /// Maximum drawdown of the cumulative settled-profit curve.
    pub max_drawdown: Decimal,
    /// Longest winning streak.
    pub max_consecutive_win: usize,
    /// Longest losing streak.
    pub max_consecutive_loss: usize,
}

impl KpiSummary {
    /// Aggregate the provided positions, in settlement order, into a summary.
    pub fn generate<'a, Positions>(positions: Positions) -> Self
    where
        Positions: IntoIterator<Item = &'a BetPosition>,
    {
        let positions: Vec<&BetPosition> = positions.into_iter().collect();
        if positions.is_empty() {
            return Self::default();
        }

        let settled: Vec<&BetPosition> = positions
            .iter()
            .copied()
            .filter(|position| position.status == PositionStatus::Settled)
            .collect();

        let total_profit: Decimal = settled.iter().map(|position| position.profit()).sum();
        let total_staked: Decimal = settled.iter().map(|position| position.stake).sum();
        let total_payout: Decimal = settled.iter().map(|position| position.payout).sum();
        let wins = settled
            .iter()
            .filter(|position| position.payout > position.stake)
            .count();

        let roi = if total_staked > Decimal::ZERO {
            (total_profit / total_staked).to_f64().unwrap_or(0.0)
        } else {
            0.0
        };
        let win_rate = if settled.is_empty() {
            0.0
        } else {
            wins as f64 / settled.len() as f64
        };
        let avg_payout = if settled.is_empty() {
            Decimal::ZERO
        } else {
            total_payout / Decimal::from(settled.len())
        };

        let profits: Vec<Decimal> = settled.iter().map(|position| position.profit()).collect();
        let outcomes: Vec<bool> = settled
            .iter()
            .map(|position| position.payout > position.stake)
            .collect();
        let (max_consecutive_win, max_consecutive_loss) = streaks(&outcomes);

        Self {
            total_bets: positions.len(),
            settled_bets: settled.len(),
            win_rate,
            roi,
            avg_payout,
            total_profit,
            max_drawdown: max_drawdown(&profits),
            max_consecutive_win,
            max_consecutive_loss,
        }
    }

    /// Render the summary as a table on stdout.
    pub fn print(&self) {
        let mut table = Table::new();
        table.add_row(row!["Metric", "Value"]);
        table.add_row(row!["Bets", format!("{}/{}", self.settled_bets, self.total_bets)]);
        table.add_row(row!["Win Rate", format!("{:.1}%", self.win_rate * 100.0)]);
        table.add_row(row!["ROI", format!("{:.2}", self.roi)]);
        table.add_row(row!["Avg Payout", self.avg_payout.to_string()]);
        table.add_row(row!["Total Profit", self.total_profit.to_string()]);
        table.add_row(row!["Max Drawdown", self.max_drawdown.to_string()]);
        table.add_row(row![
            "Streaks (W/L)",
            format!("{}/{}", self.max_consecutive_win, self.max_consecutive_loss)
        ]);
        table.printstd();
    }
}

/// Maximum peak-to-trough decline of the cumulative profit curve.
fn max_drawdown(profits: &[Decimal]) -> Decimal {
    let mut cumulative = Decimal::ZERO;
    let mut peak = Decimal::ZERO;
    let mut max_drawdown = Decimal::ZERO;
    for profit in profits {
        cumulative += *profit;
        peak = peak.max(cumulative);
        max_drawdown = max_drawdown.max(peak - cumulative);
    }
    max_drawdown
}

/// Longest winning and losing streak lengths.
fn streaks(outcomes: &[bool]) -> (usize, usize) {
    let mut max_win = 0;
    let mut max_loss = 0;
    let mut current_win = 0;
    let mut current_loss = 0;
    for won in outcomes {
        if *won {
            current_win += 1;
            current_loss = 0;
        } else {
            current_loss += 1;
            current_win = 0;
        }
        max_win = max_win.max(current_win);
        max_loss = max_loss.max(current_loss);
    }
    (max_win, max_loss)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::model::{HorseId, RaceId},
        execution::bet_type::BetType,
        portfolio::BetId,
    };
    use chrono::{DateTime, Utc};
    use rust_decimal_macros::dec;

    fn position(bet_id: &str, stake: Decimal, payout: Decimal, status: PositionStatus) -> BetPosition {
        BetPosition {
            bet_id: BetId::new(bet_id),
            race_id: RaceId::new("R1"),
            bet_type: BetType::Win,
            combination: vec![HorseId::new("H1")],
            stake,
            placed_at: DateTime::<Utc>::MIN_UTC,
            status,
            payout,
        }
    }

    #[test]
    fn test_generate_empty() {
        let positions: Vec<BetPosition> = Vec::new();
        assert_eq!(KpiSummary::generate(&positions), KpiSummary::default());
    }

    #[test]
    fn test_generate_kpis() {
        let positions = vec![
            position("bet-1", dec!(100), dec!(150), PositionStatus::Settled),
            position("bet-2", dec!(100), dec!(0), PositionStatus::Settled),
            position("bet-3", dec!(100), dec!(0), PositionStatus::Settled),
            position("bet-4", dec!(100), dec!(300), PositionStatus::Settled),
            position("bet-5", dec!(100), dec!(0), PositionStatus::Open),
        ];

        let summary = KpiSummary::generate(&positions);
        assert_eq!(summary.total_bets, 5);
        assert_eq!(summary.settled_bets, 4);
        assert_eq!(summary.win_rate, 0.5);
        // profit = 50 - 100 - 100 + 200 = 50 over 400 staked
        assert_eq!(summary.total_profit, dec!(50));
        assert_eq!(summary.roi, 0.125);
        // cumulative profits: 50, -50, -150, 50 -> peak 50, trough -150
        assert_eq!(summary.max_drawdown, dec!(200));
        assert_eq!(summary.max_consecutive_win, 1);
        assert_eq!(summary.max_consecutive_loss, 2);
        assert_eq!(summary.avg_payout, dec!(112.5));
    }
}
