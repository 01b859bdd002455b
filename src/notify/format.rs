//! HTML message rendering for Telegram.
//!
//! Line order is fixed: header, per-entity lines, top movers, aggregates,
//! sentiment, send time.

use chrono::NaiveTime;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::types::{AnnotatedCoin, AnnotatedMarket, AnnotatedPortfolio, PortfolioConfig, Sentiment};

const CMC_CURRENCY_URL: &str = "https://coinmarketcap.com/currencies";

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// CoinMarketCap page for a coin; the provider slug when known, else a
/// slug derived from the display name.
pub fn coin_link(name: &str, slug: Option<&str>) -> String {
    let slug = match slug {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => urlencoding::encode(&name.to_lowercase().replace(' ', "-")).into_owned(),
    };
    format!("{CMC_CURRENCY_URL}/{slug}/")
}

/// Sub-dollar prices get four decimals, everything else two.
pub fn format_price(price: f64) -> String {
    if price < 1.0 {
        format!("${price:.4}")
    } else {
        format!("${price:.2}")
    }
}

fn format_price_delta(delta: f64, price: f64) -> String {
    if price < 1.0 {
        format!("({delta:+.4})")
    } else {
        format!("({delta:+.2})")
    }
}

fn sent_at_line(sent_at: NaiveTime) -> String {
    format!("🕒 Sent at: {}", sent_at.format("%H:%M"))
}

/// Money to the cent, half away from zero. `{:.2}` alone truncates a
/// `Decimal`.
fn cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn format_value_delta(delta: Decimal) -> String {
    let rounded = cents(delta);
    if delta > Decimal::ZERO {
        format!(" (+{rounded:.2})")
    } else {
        format!(" ({rounded:.2})")
    }
}

// ---------------------------------------------------------------------------
// Portfolio
// ---------------------------------------------------------------------------

pub fn render_portfolio_update(
    update: &AnnotatedPortfolio,
    portfolio: &PortfolioConfig,
    sent_at: NaiveTime,
) -> String {
    let snap = &update.snapshot;
    let difference = update.value_delta.map(format_value_delta).unwrap_or_default();

    [
        format!("📊 <b>{} Update</b>", escape_html(&snap.owner)),
        format!("🔗 <b>Portfolio Link:</b> {}", escape_html(&portfolio.url)),
        String::new(),
        format!("💰 Current Value: ${:.2}{difference}", cents(snap.total_value)),
        format!("{} 24h Change: {}%", update.direction.emoji(), snap.change_pct_24h),
        format!("💵 Money Changed: ${:.2}", cents(snap.change_value_24h)),
        format!("📊 Total Lost/Gained: ${:.2}", cents(update.cumulative)),
        String::new(),
        sent_at_line(sent_at),
    ]
    .join("\n")
}

pub fn render_portfolio_alert(
    update: &AnnotatedPortfolio,
    portfolio: &PortfolioConfig,
    sent_at: NaiveTime,
) -> String {
    let snap = &update.snapshot;
    [
        format!("🚀 <b>{} Alert</b>", escape_html(&snap.owner)),
        format!("🔗 <b>Portfolio Link:</b> {}", escape_html(&portfolio.url)),
        String::new(),
        format!("💰 Current Value: ${:.2}", cents(snap.total_value)),
        format!("⚠️ Threshold of ${} crossed!", portfolio.threshold),
        sent_at_line(sent_at),
    ]
    .join("\n")
}

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

fn render_coin(coin: &AnnotatedCoin) -> Option<String> {
    let quote = &coin.quote;
    let price = quote.price?;
    let link = coin_link(&quote.name, quote.slug.as_deref());
    let (emoji, difference) = match coin.price_move {
        Some(mv) => (mv.direction.emoji(), format!(" {}", format_price_delta(mv.delta, price))),
        None => ("💰", String::new()),
    };
    Some(format!(
        "{emoji} <a href='{link}'>{} ({})</a>: {}{difference}",
        escape_html(&quote.name),
        quote.symbol,
        format_price(price),
    ))
}

pub fn render_market_update(
    update: &AnnotatedMarket,
    sentiment: Option<&Sentiment>,
    sent_at: NaiveTime,
) -> String {
    let snap = &update.snapshot;
    let mut lines = vec!["📈 <b>Crypto Market Update</b>".to_string(), String::new()];

    lines.extend(update.coins.iter().filter_map(render_coin));
    lines.push(String::new());

    let mut movers = false;
    if let Some(g) = &snap.top_gainer {
        lines.push(format!(
            "🔥 Top Gainer: <a href='{}'>{} ({})</a> ({:+.2}%)",
            coin_link(&g.name, g.slug.as_deref()),
            escape_html(&g.name),
            escape_html(&g.symbol),
            g.change_24h,
        ));
        movers = true;
    }
    if let Some(l) = &snap.top_loser {
        lines.push(format!(
            "❄️ Top Loser: <a href='{}'>{} ({})</a> ({:.2}%)",
            coin_link(&l.name, l.slug.as_deref()),
            escape_html(&l.name),
            escape_html(&l.symbol),
            l.change_24h,
        ));
        movers = true;
    }
    if movers {
        lines.push(String::new());
    }

    let btc = match update.btc_dominance_delta {
        Some(d) => format!("{:.2} ({d:+.2})", snap.btc_dominance),
        None => format!("{:.2}", snap.btc_dominance),
    };
    let fear_greed = match sentiment {
        Some(s) => format!("{} ({})", s.value, escape_html(&s.label)),
        None => "Unknown".to_string(),
    };

    lines.push(format!("🌐 Total Market Cap: ${:.2}T", snap.total_market_cap / 1e12));
    lines.push(format!("📊 BTC Dominance: {btc}%"));
    lines.push(format!("📊 ETH Dominance: {:.2}%", snap.eth_dominance));
    lines.push(format!("📊 Altcoin Dominance: {:.2}%", snap.alt_dominance));
    lines.push(format!("😨 Fear & Greed Index: {fear_greed}"));
    lines.push(String::new());
    lines.push(sent_at_line(sent_at));

    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        CoinQuote, Direction, MarketSnapshot, PortfolioSnapshot, PriceMove, Ticker, TopMover,
    };
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn at() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 5, 0).unwrap()
    }

    fn portfolio_cfg() -> PortfolioConfig {
        PortfolioConfig {
            name: "main".into(),
            url: "https://coinstats.app/p/abc?x=1&y=2".into(),
            threshold: dec!(2000),
            cumulative: dec!(0),
        }
    }

    fn annotated_portfolio(delta: Option<Decimal>, direction: Direction) -> AnnotatedPortfolio {
        AnnotatedPortfolio {
            snapshot: PortfolioSnapshot::new("Sam <3", dec!(1234.5), dec!(-2.5), dec!(-31.6)),
            value_delta: delta,
            cumulative: dec!(-40.25),
            direction,
        }
    }

    fn coin(symbol: &str, name: &str, price: Option<f64>, mv: Option<PriceMove>) -> AnnotatedCoin {
        AnnotatedCoin {
            quote: CoinQuote {
                symbol: Ticker::new(symbol).unwrap(),
                name: name.into(),
                slug: None,
                price,
                change_24h: None,
            },
            price_move: mv,
        }
    }

    fn market(coins: Vec<AnnotatedCoin>, btc_delta: Option<f64>) -> AnnotatedMarket {
        AnnotatedMarket {
            snapshot: MarketSnapshot {
                id: Uuid::new_v4(),
                coins: coins.iter().map(|c| c.quote.clone()).collect(),
                top_gainer: Some(TopMover {
                    name: "Pepe".into(),
                    symbol: "PEPE".into(),
                    slug: Some("pepe".into()),
                    change_24h: 35.2,
                }),
                top_loser: Some(TopMover {
                    name: "Terra Classic".into(),
                    symbol: "LUNC".into(),
                    slug: None,
                    change_24h: -40.1,
                }),
                total_market_cap: 2.456e12,
                btc_dominance: 54.321,
                eth_dominance: 17.0,
                alt_dominance: 28.679,
                captured_at: Utc::now(),
            },
            coins,
            btc_dominance_delta: btc_delta,
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a<b>&'\""), "a&lt;b&gt;&amp;&#39;&quot;");
    }

    #[test]
    fn test_coin_link_prefers_slug() {
        assert_eq!(coin_link("Bitcoin", Some("bitcoin")), "https://coinmarketcap.com/currencies/bitcoin/");
        assert_eq!(
            coin_link("Terra Classic", None),
            "https://coinmarketcap.com/currencies/terra-classic/"
        );
    }

    #[test]
    fn test_format_price_precision() {
        assert_eq!(format_price(0.123456), "$0.1235");
        assert_eq!(format_price(64000.5), "$64000.50");
    }

    #[test]
    fn test_portfolio_update_first_cycle() {
        let msg = render_portfolio_update(&annotated_portfolio(None, Direction::Down), &portfolio_cfg(), at());
        let expected = "📊 <b>Sam &lt;3 Update</b>\n\
            🔗 <b>Portfolio Link:</b> https://coinstats.app/p/abc?x=1&amp;y=2\n\
            \n\
            💰 Current Value: $1234.50\n\
            📉 24h Change: -2.5%\n\
            💵 Money Changed: $-31.60\n\
            📊 Total Lost/Gained: $-40.25\n\
            \n\
            🕒 Sent at: 09:05";
        assert_eq!(msg, expected);
    }

    #[test]
    fn test_portfolio_update_difference_signs() {
        let up = render_portfolio_update(
            &annotated_portfolio(Some(dec!(12.3)), Direction::Up),
            &portfolio_cfg(),
            at(),
        );
        assert!(up.contains("💰 Current Value: $1234.50 (+12.30)"));
        assert!(up.contains("📈 24h Change"));

        let down = render_portfolio_update(
            &annotated_portfolio(Some(dec!(-5)), Direction::Down),
            &portfolio_cfg(),
            at(),
        );
        assert!(down.contains("$1234.50 (-5.00)"));

        let flat = render_portfolio_update(
            &annotated_portfolio(Some(dec!(0)), Direction::Unchanged),
            &portfolio_cfg(),
            at(),
        );
        assert!(flat.contains("$1234.50 (0.00)"));
        assert!(flat.contains("➖ 24h Change"));
    }

    #[test]
    fn test_portfolio_amounts_round_to_cents() {
        let update = AnnotatedPortfolio {
            snapshot: PortfolioSnapshot::new("Sam", dec!(1234.567), dec!(1.2), dec!(9.999)),
            value_delta: Some(dec!(1134.565)),
            cumulative: dec!(-0.005),
            direction: Direction::Up,
        };
        let msg = render_portfolio_update(&update, &portfolio_cfg(), at());
        assert!(msg.contains("💰 Current Value: $1234.57 (+1134.57)"));
        assert!(msg.contains("💵 Money Changed: $10.00"));
        assert!(msg.contains("📊 Total Lost/Gained: $-0.01"));

        let alert = render_portfolio_alert(&update, &portfolio_cfg(), at());
        assert!(alert.contains("💰 Current Value: $1234.57"));
    }

    #[test]
    fn test_portfolio_alert() {
        let msg = render_portfolio_alert(&annotated_portfolio(None, Direction::Up), &portfolio_cfg(), at());
        assert!(msg.starts_with("🚀 <b>Sam &lt;3 Alert</b>"));
        assert!(msg.contains("⚠️ Threshold of $2000 crossed!"));
        assert!(msg.ends_with("🕒 Sent at: 09:05"));
    }

    #[test]
    fn test_market_update_layout() {
        let coins = vec![
            coin("BTC", "Bitcoin", Some(64000.0), Some(PriceMove { direction: Direction::Up, delta: 150.0 })),
            coin("DOGE", "Dogecoin", Some(0.1234), Some(PriceMove { direction: Direction::Down, delta: -0.0021 })),
            coin("ADA", "Cardano", Some(0.45), None),
            coin("NOP", "Noprice", None, None),
        ];
        let sentiment = Sentiment { value: 27, label: "Fear".into() };
        let msg = render_market_update(&market(coins, Some(-0.25)), Some(&sentiment), at());
        let lines: Vec<&str> = msg.lines().collect();

        assert_eq!(lines[0], "📈 <b>Crypto Market Update</b>");
        assert_eq!(lines[1], "");
        assert_eq!(
            lines[2],
            "📈 <a href='https://coinmarketcap.com/currencies/bitcoin/'>Bitcoin (BTC)</a>: $64000.00 (+150.00)"
        );
        assert_eq!(
            lines[3],
            "📉 <a href='https://coinmarketcap.com/currencies/dogecoin/'>Dogecoin (DOGE)</a>: $0.1234 (-0.0021)"
        );
        assert_eq!(
            lines[4],
            "💰 <a href='https://coinmarketcap.com/currencies/cardano/'>Cardano (ADA)</a>: $0.4500"
        );
        assert_eq!(lines[5], "");
        assert!(lines[6].starts_with("🔥 Top Gainer:"));
        assert!(lines[6].ends_with("(+35.20%)"));
        assert!(lines[7].contains("terra-classic"));
        assert!(lines[7].ends_with("(-40.10%)"));
        assert_eq!(lines[8], "");
        assert_eq!(lines[9], "🌐 Total Market Cap: $2.46T");
        assert_eq!(lines[10], "📊 BTC Dominance: 54.32 (-0.25)%");
        assert_eq!(lines[11], "📊 ETH Dominance: 17.00%");
        assert_eq!(lines[12], "📊 Altcoin Dominance: 28.68%");
        assert_eq!(lines[13], "😨 Fear & Greed Index: 27 (Fear)");
        assert_eq!(lines[14], "");
        assert_eq!(lines[15], "🕒 Sent at: 09:05");
    }

    #[test]
    fn test_market_update_unknown_sentiment_and_first_cycle() {
        let msg = render_market_update(&market(vec![], None), None, at());
        assert!(msg.contains("😨 Fear & Greed Index: Unknown"));
        assert!(msg.contains("📊 BTC Dominance: 54.32%"));
    }
}
