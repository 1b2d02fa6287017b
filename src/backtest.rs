//! Daily backtester
//!
//! Reference host for the breakout engine. The engine runs at each session's
//! open and sees only completed bars; the latest completed close is the price
//! it acts on. Entries fill at the session open. A resting stop-market sell
//! fills during the session when the low touches its trigger, at the trigger or
//! at the open when the bar gaps below it.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::BreakoutStopEngine;
use crate::host::{Broker, PriceFeed};
use crate::{
    Candle, Config, EngineError, ExitReason, Intent, PerformanceMetrics, Symbol, Trade,
};

/// Completed bars visible to the engine at a session open
struct BarFeed<'a> {
    bars: &'a [Candle],
}

impl BarFeed<'_> {
    fn tail(&self, n: usize, field: fn(&Candle) -> f64) -> Result<Vec<f64>> {
        if self.bars.len() < n {
            return Err(EngineError::history(n, self.bars.len()).into());
        }
        Ok(self.bars[self.bars.len() - n..].iter().map(field).collect())
    }
}

impl PriceFeed for BarFeed<'_> {
    fn close_history(&self, n: usize) -> Result<Vec<f64>> {
        self.tail(n, |c| c.close)
    }

    fn high_history(&self, n: usize) -> Result<Vec<f64>> {
        self.tail(n, |c| c.high)
    }

    fn current_close(&self) -> Result<f64> {
        self.bars
            .last()
            .map(|c| c.close)
            .ok_or_else(|| EngineError::history(1, 0).into())
    }
}

#[derive(Debug, Clone)]
struct OpenPosition {
    quantity: f64,
    entry_price: f64,
    entry_time: DateTime<Utc>,
    entry_commission: f64,
}

#[derive(Debug, Clone, Copy)]
struct StopOrder {
    quantity: f64,
    trigger_price: f64,
}

/// Cash account with one instrument and at most one resting stop
struct SimulatedBroker {
    symbol: Symbol,
    cash: f64,
    commission: f64,
    position: Option<OpenPosition>,
    stop: Option<StopOrder>,
    session_time: DateTime<Utc>,
    session_open: f64,
}

impl SimulatedBroker {
    fn new(symbol: Symbol, cash: f64, commission: f64) -> Self {
        Self {
            symbol,
            cash,
            commission,
            position: None,
            stop: None,
            session_time: DateTime::<Utc>::MIN_UTC,
            session_open: 0.0,
        }
    }

    fn begin_session(&mut self, bar: &Candle) {
        self.session_time = bar.datetime;
        self.session_open = bar.open;
    }

    fn equity(&self, price: f64) -> f64 {
        self.cash + self.position.as_ref().map_or(0.0, |p| p.quantity * price)
    }

    fn stop_price(&self) -> Option<f64> {
        self.stop.map(|s| s.trigger_price)
    }

    /// Fill the resting stop if `bar` trades through it
    fn check_stop(&mut self, bar: &Candle) -> Option<Trade> {
        let stop = self.stop?;
        if bar.low > stop.trigger_price {
            return None;
        }
        let fill_price = bar.open.min(stop.trigger_price);
        self.stop = None;
        self.close_position(fill_price, bar.datetime, ExitReason::StopLoss)
    }

    fn close_position(
        &mut self,
        exit_price: f64,
        exit_time: DateTime<Utc>,
        reason: ExitReason,
    ) -> Option<Trade> {
        let pos = self.position.take()?;
        self.stop = None;

        let proceeds = pos.quantity * exit_price;
        let exit_commission = proceeds * self.commission;
        self.cash += proceeds - exit_commission;

        let pnl = (exit_price - pos.entry_price) * pos.quantity;
        let commission = pos.entry_commission + exit_commission;
        let trade = Trade {
            symbol: self.symbol.clone(),
            entry_price: pos.entry_price,
            exit_price,
            quantity: pos.quantity,
            entry_time: pos.entry_time,
            exit_time,
            pnl,
            commission,
            net_pnl: pnl - commission,
            exit_reason: reason,
        };

        tracing::info!(
            "{} SELL EXECUTED for {}: Price={:.2}, Reason={}, PnL={:.2}",
            exit_time.format("%Y-%m-%d"),
            self.symbol,
            exit_price,
            reason,
            trade.net_pnl
        );

        Some(trade)
    }
}

impl Broker for SimulatedBroker {
    fn position_quantity(&self) -> f64 {
        self.position.as_ref().map_or(0.0, |p| p.quantity)
    }

    fn has_open_stop_order(&self) -> bool {
        self.stop.is_some()
    }

    fn execute(&mut self, intent: &Intent) -> Result<()> {
        match *intent {
            Intent::EnterFullPosition => {
                if self.position.is_some() {
                    anyhow::bail!("Entry requested while already holding {}", self.symbol);
                }
                let price = self.session_open;
                let quantity = (self.cash / (price * (1.0 + self.commission))).floor();
                if quantity < 1.0 {
                    tracing::warn!(
                        cash = self.cash,
                        price,
                        "Insufficient cash for a single share, entry skipped"
                    );
                    return Ok(());
                }
                let commission = quantity * price * self.commission;
                self.cash -= quantity * price + commission;
                self.position = Some(OpenPosition {
                    quantity,
                    entry_price: price,
                    entry_time: self.session_time,
                    entry_commission: commission,
                });

                tracing::info!(
                    "{} BUY EXECUTED for {}: Price={:.2}, Qty={}",
                    self.session_time.format("%Y-%m-%d"),
                    self.symbol,
                    price,
                    quantity
                );
            }
            Intent::PlaceStopOrder {
                quantity,
                trigger_price,
            } => {
                let held = self.position_quantity();
                if held <= 0.0 {
                    anyhow::bail!("Stop order requested without a position in {}", self.symbol);
                }
                self.stop = Some(StopOrder {
                    quantity: quantity.min(held),
                    trigger_price,
                });
            }
            Intent::UpdateStopOrder { trigger_price } => match self.stop.as_mut() {
                Some(stop) => stop.trigger_price = trigger_price,
                None => anyhow::bail!("No resting stop to update for {}", self.symbol),
            },
        }
        Ok(())
    }
}

/// One row per simulated session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub datetime: DateTime<Utc>,
    pub close: f64,
    pub lookback: usize,
    pub stop_price: Option<f64>,
    pub equity: f64,
}

#[derive(Debug, Default)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    pub sessions: Vec<SessionRecord>,
    pub metrics: PerformanceMetrics,
}

impl BacktestResult {
    pub fn equity_curve(&self) -> Vec<(DateTime<Utc>, f64)> {
        self.sessions.iter().map(|s| (s.datetime, s.equity)).collect()
    }
}

/// Backtest engine
pub struct Backtester {
    config: Config,
}

impl Backtester {
    pub fn new(config: Config) -> Self {
        Backtester { config }
    }

    /// Run one engine over daily bars (oldest-first)
    pub fn run(&self, candles: &[Candle]) -> Result<BacktestResult> {
        let mut engine = BreakoutStopEngine::new(self.config.engine.clone())?;
        let mut broker = SimulatedBroker::new(
            self.config.trading.symbol(),
            self.config.trading.initial_capital,
            self.config.trading.commission,
        );
        let mut trades = Vec::new();
        let mut sessions = Vec::with_capacity(candles.len());

        for i in 1..candles.len() {
            let bar = &candles[i];
            let feed = BarFeed {
                bars: &candles[..i],
            };
            broker.begin_session(bar);

            match engine.on_market_open(&feed, &mut broker) {
                Ok(report) => {
                    if !report.intents.is_empty() {
                        tracing::debug!(
                            date = %bar.datetime.format("%Y-%m-%d"),
                            intents = ?report.intents,
                            lookback = report.lookback,
                            "Session intents executed"
                        );
                    }
                }
                Err(e) => match e.downcast_ref::<EngineError>() {
                    Some(EngineError::InvalidHistoryLength { required, actual }) => {
                        tracing::debug!(
                            date = %bar.datetime.format("%Y-%m-%d"),
                            required,
                            actual,
                            "Not enough history, session skipped"
                        );
                    }
                    _ => return Err(e),
                },
            }

            // Record the stop that rested during the session, before any fill
            let stop_price = broker.stop_price();
            if let Some(trade) = broker.check_stop(bar) {
                trades.push(trade);
            }

            sessions.push(SessionRecord {
                datetime: bar.datetime,
                close: bar.close,
                lookback: engine.lookback(),
                stop_price,
                equity: broker.equity(bar.close),
            });
        }

        if let Some(last) = candles.last() {
            if let Some(trade) = broker.close_position(last.close, last.datetime, ExitReason::EndOfData)
            {
                trades.push(trade);
            }
            if let Some(session) = sessions.last_mut() {
                session.equity = broker.equity(last.close);
            }
        }

        let metrics = self.calculate_metrics(&trades, &sessions);

        Ok(BacktestResult {
            trades,
            sessions,
            metrics,
        })
    }

    fn calculate_metrics(&self, trades: &[Trade], sessions: &[SessionRecord]) -> PerformanceMetrics {
        let Some(last_session) = sessions.last() else {
            return PerformanceMetrics::default();
        };

        let initial_capital = self.config.trading.initial_capital;
        let final_capital = last_session.equity;
        let total_return = ((final_capital - initial_capital) / initial_capital) * 100.0;

        let total_commission: f64 = trades.iter().map(|t| t.commission).sum();

        let winning_trades: Vec<&Trade> = trades.iter().filter(|t| t.net_pnl > 0.0).collect();
        let losing_trades: Vec<&Trade> = trades.iter().filter(|t| t.net_pnl <= 0.0).collect();

        let win_rate = if !trades.is_empty() {
            (winning_trades.len() as f64 / trades.len() as f64) * 100.0
        } else {
            0.0
        };

        let gross_profits: f64 = winning_trades.iter().map(|t| t.net_pnl).sum();
        let gross_losses: f64 = losing_trades.iter().map(|t| t.net_pnl.abs()).sum();

        let profit_factor = if gross_losses > 0.0 {
            gross_profits / gross_losses
        } else if gross_profits > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if !winning_trades.is_empty() {
            gross_profits / winning_trades.len() as f64
        } else {
            0.0
        };

        let avg_loss = if !losing_trades.is_empty() {
            gross_losses / losing_trades.len() as f64
        } else {
            0.0
        };

        let largest_win = winning_trades.iter().map(|t| t.net_pnl).fold(0.0, f64::max);
        let largest_loss = losing_trades.iter().map(|t| t.net_pnl).fold(0.0, f64::min);

        let mut peak = initial_capital;
        let mut max_dd = 0.0;
        for session in sessions {
            if session.equity > peak {
                peak = session.equity;
            }
            let dd = (peak - session.equity) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }

        // Equity sessions, annualized over 252 trading days
        const TRADING_DAYS_PER_YEAR: f64 = 252.0;
        const RISK_FREE_RATE: f64 = 0.02;
        let daily_risk_free = RISK_FREE_RATE / TRADING_DAYS_PER_YEAR;

        let all_returns: Vec<f64> = sessions
            .windows(2)
            .map(|w| (w[1].equity - w[0].equity) / w[0].equity)
            .collect();

        // Volatility from invested days only; cash days carry no market risk
        let active_returns: Vec<f64> = all_returns.iter().filter(|&&r| r != 0.0).copied().collect();

        let n_total = all_returns.len() as f64;
        let n_active = active_returns.len() as f64;

        let sharpe_ratio = if n_total > 0.0 && n_active > 1.0 {
            let mean_return = all_returns.iter().sum::<f64>() / n_total;
            let excess_return = mean_return - daily_risk_free;

            let active_mean = active_returns.iter().sum::<f64>() / n_active;
            let variance = active_returns
                .iter()
                .map(|r| (r - active_mean).powi(2))
                .sum::<f64>()
                / (n_active - 1.0);
            let std_dev = variance.sqrt();

            if std_dev > 0.0 {
                excess_return / std_dev * TRADING_DAYS_PER_YEAR.sqrt()
            } else {
                0.0
            }
        } else {
            0.0
        };

        PerformanceMetrics {
            total_return,
            sharpe_ratio,
            max_drawdown: max_dd * 100.0,
            win_rate,
            profit_factor,
            total_trades: trades.len(),
            winning_trades: winning_trades.len(),
            losing_trades: losing_trades.len(),
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            total_commission,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn bar(day: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
        let start = DateTime::<Utc>::from_timestamp(1_600_000_000, 0).unwrap();
        Candle::new(start + Duration::days(day), open, high, low, close, 1000.0).unwrap()
    }

    #[test]
    fn test_bar_feed_history() {
        let bars: Vec<Candle> = (0..5)
            .map(|d| bar(d, 10.0, 11.0 + d as f64, 9.0, 10.5))
            .collect();
        let feed = BarFeed { bars: &bars };

        assert_eq!(feed.high_history(2).unwrap(), vec![14.0, 15.0]);
        assert_eq!(feed.current_close().unwrap(), 10.5);

        let err = feed.close_history(6).unwrap_err();
        assert_eq!(
            err.downcast_ref::<EngineError>(),
            Some(&EngineError::history(6, 5))
        );
    }

    #[test]
    fn test_broker_entry_buys_whole_shares() {
        let mut broker = SimulatedBroker::new(Symbol::new("WMT"), 1000.0, 0.0);
        broker.begin_session(&bar(0, 30.0, 31.0, 29.0, 30.5));
        broker.execute(&Intent::EnterFullPosition).unwrap();

        assert_eq!(broker.position_quantity(), 33.0);
        assert!((broker.cash - 10.0).abs() < 1e-9);
        assert!(broker.execute(&Intent::EnterFullPosition).is_err());
    }

    #[test]
    fn test_broker_rejects_stop_without_position() {
        let mut broker = SimulatedBroker::new(Symbol::new("WMT"), 1000.0, 0.0);
        let place = Intent::PlaceStopOrder {
            quantity: 10.0,
            trigger_price: 9.0,
        };
        assert!(broker.execute(&place).is_err());
        assert!(broker
            .execute(&Intent::UpdateStopOrder { trigger_price: 9.5 })
            .is_err());
    }

    #[test]
    fn test_stop_fills_at_trigger_or_gap_open() {
        let mut broker = SimulatedBroker::new(Symbol::new("WMT"), 1000.0, 0.0);
        broker.begin_session(&bar(0, 10.0, 10.5, 9.5, 10.0));
        broker.execute(&Intent::EnterFullPosition).unwrap();
        broker
            .execute(&Intent::PlaceStopOrder {
                quantity: 100.0,
                trigger_price: 9.0,
            })
            .unwrap();

        // Low stays above the trigger
        assert!(broker.check_stop(&bar(1, 10.0, 10.2, 9.1, 9.8)).is_none());

        // Gap below the trigger fills at the open
        let trade = broker.check_stop(&bar(2, 8.5, 8.8, 8.0, 8.6)).unwrap();
        assert_eq!(trade.exit_price, 8.5);
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert_eq!(broker.position_quantity(), 0.0);
        assert!(!broker.has_open_stop_order());
    }

    #[test]
    fn test_run_without_enough_history_makes_no_trades() {
        let bars: Vec<Candle> = (0..20).map(|d| bar(d, 10.0, 11.0, 9.0, 10.5)).collect();
        let result = Backtester::new(Config::default()).run(&bars).unwrap();

        assert!(result.trades.is_empty());
        assert_eq!(result.sessions.len(), 19);
        let curve = result.equity_curve();
        assert_eq!(curve.len(), 19);
        assert_eq!(curve[0].0, bars[1].datetime);
        assert!(curve.iter().all(|(_, e)| *e == 100_000.0));
        assert_eq!(result.metrics.total_trades, 0);
        assert!((result.metrics.total_return).abs() < 1e-12);
    }
}
