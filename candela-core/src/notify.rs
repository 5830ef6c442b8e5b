//! Notification text blocks for the signal-forwarding transport.
//!
//! The new-signal block follows the copy-tradeable format: slashed symbol,
//! `Signal Type: Regular (Long|Short)`, `Leverage: Cross (NX)`, an entry
//! zone, numbered take-profit targets, and one stop target. Prices carry
//! magnitude-dependent precision: 1 decimal at ≥10000, 2 at ≥100, 4 at ≥1,
//! 6 below.

use serde::{Deserialize, Serialize};

use crate::domain::Direction;
use crate::error::CoreError;

/// A signal ready for the notification transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalMessage {
    /// Exchange symbol without separator, e.g. `BTCUSDT`.
    pub symbol: String,
    pub side: Direction,
    pub leverage: u32,
    pub entry_price: f64,
    /// Ascending TP ladder (away from entry).
    pub take_profits: Vec<f64>,
    pub stop_loss: f64,
}

impl SignalMessage {
    /// Validate price relationships before formatting.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.take_profits.is_empty() {
            return Err(CoreError::invalid("at least one take-profit is required"));
        }
        match self.side {
            Direction::Long => {
                if self.stop_loss >= self.entry_price {
                    return Err(CoreError::invalid("stop must be below entry for a long"));
                }
                if self.take_profits.iter().any(|&tp| tp <= self.entry_price) {
                    return Err(CoreError::invalid("TPs must be above entry for a long"));
                }
            }
            Direction::Short => {
                if self.stop_loss <= self.entry_price {
                    return Err(CoreError::invalid("stop must be above entry for a short"));
                }
                if self.take_profits.iter().any(|&tp| tp >= self.entry_price) {
                    return Err(CoreError::invalid("TPs must be below entry for a short"));
                }
            }
        }
        Ok(())
    }
}

/// `BTCUSDT` → `BTC/USDT`. Unknown quotes are returned unchanged.
pub fn format_symbol(symbol: &str) -> String {
    for quote in ["USDT", "BUSD", "USDC", "BTC", "ETH"] {
        if let Some(base) = symbol.strip_suffix(quote) {
            if !base.is_empty() {
                return format!("{base}/{quote}");
            }
        }
    }
    symbol.to_string()
}

/// Magnitude-dependent price precision.
pub fn format_price(price: f64) -> String {
    if price >= 10_000.0 {
        format!("{price:.1}")
    } else if price >= 100.0 {
        format!("{price:.2}")
    } else if price >= 1.0 {
        format!("{price:.4}")
    } else {
        format!("{price:.6}")
    }
}

fn side_label(side: Direction) -> &'static str {
    match side {
        Direction::Long => "Long",
        Direction::Short => "Short",
    }
}

/// Render the new-signal block.
pub fn format_new_signal(signal: &SignalMessage) -> String {
    let mut lines = vec![
        format!("#{}", format_symbol(&signal.symbol)),
        String::new(),
        format!("Signal Type: Regular ({})", side_label(signal.side)),
        String::new(),
        format!("Leverage: Cross ({}X)", signal.leverage),
        String::new(),
        "Entry Zone:".to_string(),
        format_price(signal.entry_price),
        String::new(),
        "Take-Profit Targets:".to_string(),
    ];

    for (i, tp) in signal.take_profits.iter().enumerate() {
        lines.push(format!("{}) {}", i + 1, format_price(*tp)));
    }

    lines.push(String::new());
    lines.push("Stop Targets:".to_string());
    lines.push(format!("1) {}", format_price(signal.stop_loss)));

    lines.join("\n")
}

/// Parse a formatted signal block back into its fields. Inverse of
/// [`format_new_signal`] up to price precision.
pub fn parse_signal(text: &str) -> Option<SignalMessage> {
    let lines: Vec<&str> = text.lines().collect();

    let symbol = lines
        .iter()
        .find(|l| l.starts_with('#'))?
        .trim_start_matches('#')
        .replace('/', "");

    let side_line = lines.iter().find(|l| l.starts_with("Signal Type:"))?;
    let side = if side_line.contains("Long") {
        Direction::Long
    } else if side_line.contains("Short") {
        Direction::Short
    } else {
        return None;
    };

    let leverage_line = lines.iter().find(|l| l.starts_with("Leverage:"))?;
    let leverage: u32 = leverage_line
        .split('(')
        .nth(1)?
        .trim_end_matches(')')
        .trim_end_matches('X')
        .parse()
        .ok()?;

    let entry_label = lines.iter().position(|l| l.starts_with("Entry Zone:"))?;
    let entry_price: f64 = lines.get(entry_label + 1)?.trim().parse().ok()?;

    let tp_label = lines
        .iter()
        .position(|l| l.starts_with("Take-Profit Targets:"))?;
    let mut take_profits = Vec::new();
    for line in &lines[tp_label + 1..] {
        let Some((_, price)) = line.split_once(") ") else {
            break;
        };
        take_profits.push(price.trim().parse().ok()?);
    }

    let sl_label = lines.iter().position(|l| l.starts_with("Stop Targets:"))?;
    let stop_loss: f64 = lines
        .get(sl_label + 1)?
        .split_once(") ")?
        .1
        .trim()
        .parse()
        .ok()?;

    Some(SignalMessage {
        symbol,
        side,
        leverage,
        entry_price,
        take_profits,
        stop_loss,
    })
}

/// Render a TP-hit notification.
pub fn format_tp_hit(
    symbol: &str,
    side: Direction,
    level: usize,
    price: f64,
    pnl_percent: f64,
    closed_percent: f64,
    remaining_percent: f64,
    new_sl: Option<f64>,
) -> String {
    let mut lines = vec![
        format!(
            "TP{level} hit — {} {}",
            format_symbol(symbol),
            side_label(side).to_uppercase()
        ),
        format!(
            "Closed {closed_percent:.0}% at {} ({pnl_percent:+.1}%)",
            format_price(price)
        ),
    ];
    if let Some(sl) = new_sl {
        lines.push(format!("Stop moved to {}", format_price(sl)));
    }
    if remaining_percent > 0.0 {
        lines.push(format!("Remaining: {remaining_percent:.0}% of position"));
    } else {
        lines.push("Position fully closed".to_string());
    }
    lines.join("\n")
}

/// Render an SL-hit notification.
pub fn format_sl_hit(symbol: &str, side: Direction, price: f64, pnl_percent: f64) -> String {
    format!(
        "SL hit — {} {}\nClosed at {} ({pnl_percent:+.1}%)",
        format_symbol(symbol),
        side_label(side).to_uppercase(),
        format_price(price)
    )
}
