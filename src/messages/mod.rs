//! Chat message texts for signal events and reports.

use crate::config::TelegramConfig;
use crate::signal::{EntryWindow, SignalEvent};
use crate::stats::DailyReport;
use chrono::NaiveDateTime;

/// Footer link appended to signal tables.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub label: String,
    pub url: String,
}

impl Link {
    /// Both label and URL must be set.
    pub fn from_config(config: &TelegramConfig) -> Option<Self> {
        match (&config.link_label, &config.link_url) {
            (Some(label), Some(url)) if !label.is_empty() && !url.is_empty() => Some(Self {
                label: label.clone(),
                url: url.clone(),
            }),
            _ => None,
        }
    }
}

pub fn signal_table(windows: &[EntryWindow; 3], link: Option<&Link>) -> String {
    let tolerance = windows[0].tolerance.num_minutes();
    let mut text = String::from("ENTRADA CONFIRMADA ✅\n");
    for w in windows {
        text.push_str(&format!("⚪️{}\n", w.center.format("%H:%M")));
    }
    text.push_str(&format!("{} MIN ANTES {} MIN DEPOIS\n", tolerance, tolerance));
    if let Some(link) = link {
        text.push_str(&format!("\n[{}]({})\n", link.label, link.url));
    }
    text
}

pub fn win(at: NaiveDateTime) -> String {
    format!("GREEN BRANCO-⚪️✅({})", at.format("%H:%M"))
}

pub fn retired(had_hits: bool) -> String {
    if had_hits {
        "⏰ Sinal finalizado! Todos os horários foram analisados.".to_string()
    } else {
        "Não veio ! Analisando Possível entrada!🎯".to_string()
    }
}

pub fn render(event: &SignalEvent, link: Option<&Link>) -> String {
    match event {
        SignalEvent::Armed { windows, .. } => signal_table(windows, link),
        SignalEvent::Win { at } => win(*at),
        SignalEvent::Retired { had_hits } => retired(*had_hits),
    }
}

pub fn daily_report(report: &DailyReport) -> String {
    let c = &report.counters;
    format!(
        "📊 RELATÓRIO DIÁRIO - BOT BRANCO\n\n\
         ✅ Acertos: {}\n\
         ❌ Erros: {}\n\
         🎯 Total de sinais: {}\n\
         📈 Assertividade: {:.1}%\n\n\
         📅 Data: {}",
        c.total_hits,
        c.total_misses,
        c.total_signals,
        report.hit_rate_pct(),
        report.date.format("%d/%m/%Y"),
    )
}

/// Sent by the pre-flight check.
pub fn self_test(now: NaiveDateTime) -> String {
    format!(
        "🧪 TESTE DO BOT BRANCO\n\n⏰ {}\n✅ Configurações OK!\n🤖 Bot funcionando corretamente!\n\nEste é um teste automático.",
        now.format("%H:%M:%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyConfig;
    use crate::signal::entry_windows;
    use crate::stats::DailyCounters;
    use chrono::NaiveDate;

    fn t(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(h, m, 12)
            .unwrap()
    }

    #[test]
    fn test_signal_table() {
        let windows = entry_windows(t(12, 27), &StrategyConfig::default());
        let link = Link {
            label: "🎯 BLAZE DOUBLE".to_string(),
            url: "https://example.com/r/1".to_string(),
        };

        let text = signal_table(&windows, Some(&link));
        assert_eq!(
            text,
            "ENTRADA CONFIRMADA ✅\n⚪️12:31\n⚪️12:34\n⚪️12:37\n1 MIN ANTES 1 MIN DEPOIS\n\n[🎯 BLAZE DOUBLE](https://example.com/r/1)\n"
        );
        assert!(!signal_table(&windows, None).contains('['));
    }

    #[test]
    fn test_event_texts() {
        assert_eq!(render(&SignalEvent::Win { at: t(12, 34) }, None), "GREEN BRANCO-⚪️✅(12:34)");
        assert!(render(&SignalEvent::Retired { had_hits: false }, None).starts_with("Não veio"));
        assert!(render(&SignalEvent::Retired { had_hits: true }, None).starts_with("⏰ Sinal finalizado"));
    }

    #[test]
    fn test_daily_report() {
        let report = DailyReport {
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            counters: DailyCounters {
                signals_today: 3,
                total_signals: 3,
                total_hits: 2,
                total_misses: 1,
            },
        };
        let text = daily_report(&report);
        assert!(text.contains("✅ Acertos: 2"));
        assert!(text.contains("❌ Erros: 1"));
        assert!(text.contains("🎯 Total de sinais: 3"));
        assert!(text.contains("📈 Assertividade: 66.7%"));
        assert!(text.contains("📅 Data: 01/05/2024"));
    }

    #[test]
    fn test_link_requires_both_parts() {
        let mut config = TelegramConfig {
            token: "t".to_string(),
            chat_id: "c".to_string(),
            api_url: "https://api.telegram.org".to_string(),
            link_label: Some("site".to_string()),
            link_url: None,
        };
        assert!(Link::from_config(&config).is_none());
        config.link_url = Some("https://example.com".to_string());
        assert_eq!(Link::from_config(&config).unwrap().label, "site");
    }
}
