use crate::backtest::runner::SimulationState;
use crate::models::{format_pct, ratio_or_none, BuyEvent, DailyRecord, Summary};
use crate::strategy::StrategyParams;
use serde::{Deserialize, Serialize};

/// Mark the final holdings to `last_record`'s close
pub fn summarize(state: &SimulationState, last_record: &DailyRecord, stopped_early: bool) -> Summary {
    let last_price = last_record.close_price();
    let total_shares = state.total_shares();
    let value_of_shares = total_shares * last_price;
    let total_profit = value_of_shares - state.cash_invested;

    let average_cost_basis = if total_shares > 0.0 {
        Some(state.cash_invested / total_shares)
    } else {
        None
    };

    Summary {
        last_day: last_record.sequence_index,
        last_price,
        buy_count: state.investments.len(),
        total_shares,
        value_of_shares,
        cash_invested: state.cash_invested,
        cash_remaining: state.cash_remaining,
        total_profit,
        total_profit_pct: ratio_or_none(total_profit, state.cash_invested),
        average_cost_basis,
        stopped_early,
    }
}

/// Complete output of a backtest run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BacktestReport {
    pub strategy: String,
    pub params: StrategyParams,
    pub days_in_series: usize,
    pub days_processed: usize,
    pub events: Vec<BuyEvent>,
    pub summary: Summary,
}

impl BacktestReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// One block per buy, like a trade log
    pub fn print_events(&self) {
        for event in &self.events {
            println!(
                "Investor buys on day {} since the change since last close is {}. It has been {} days since the last buy.",
                event.day,
                format_pct(Some(event.price_change_pct)),
                event.days_waited
            );
            println!(
                "  The buy amount is ${:.2} for {:.6} shares at a price of ${:.2}",
                event.amount_deployed, event.shares_bought, event.price
            );
            println!(
                "  Invested ${:.2} into {:.6} shares worth ${:.2}: profit (or loss) ${:.2} ({}). Cash remaining ${:.2}\n",
                event.cash_invested,
                event.cumulative_shares,
                event.cumulative_value,
                event.profit,
                format_pct(event.profit_pct),
                event.cash_remaining
            );
        }
    }

    /// Print a formatted report to stdout
    pub fn print_report(&self) {
        self.print_events();

        let s = &self.summary;
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║              DCA BACKTEST SUMMARY                     ║");
        println!("╚═══════════════════════════════════════════════════════╝\n");

        println!("📋 STRATEGY");
        println!("  Strategy:              {}", self.strategy);
        println!("  Start With:            ${:.2}", self.params.starting_cash);
        println!("  Deploy Size:           ${:.2}", self.params.base_deployment_size);
        println!(
            "  Deploy When:           day-over-day change at or below {}",
            format_pct(Some(self.params.buy_threshold))
        );

        println!("\n📈 ACTIVITY");
        println!(
            "  Days Processed:        {} of {}",
            self.days_processed,
            self.days_in_series.saturating_sub(1)
        );
        println!("  Buys:                  {}", s.buy_count);
        if s.stopped_early {
            println!("  Stopped early on day {}: cash is gone", s.last_day);
        }

        println!("\n💰 SUMMARY");
        println!("  Owned Shares:          {:.6}", s.total_shares);
        println!(
            "  Value of Shares:       ${:.2} (at ${:.2}, day {})",
            s.value_of_shares, s.last_price, s.last_day
        );
        println!("  Cash Invested:         ${:.2}", s.cash_invested);
        println!("  Cash Remaining:        ${:.2}", s.cash_remaining);
        match s.average_cost_basis {
            Some(basis) => println!("  Average Cost Basis:    ${:.2}", basis),
            None => println!("  Average Cost Basis:    n/a"),
        }
        if s.invested_anything() {
            println!(
                "  Total Profit:          ${:.2} ({})",
                s.total_profit,
                format_pct(s.total_profit_pct)
            );
        } else {
            println!("  Total Profit:          n/a (no investment made)");
        }

        println!("\n═══════════════════════════════════════════════════════\n");
    }
}
