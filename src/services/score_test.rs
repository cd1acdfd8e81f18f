use super::*;

#[test]
fn team_parses_only_known_ids() {
    assert_eq!("team_green".parse::<Team>(), Ok(Team::Green));
    assert_eq!("team_purple".parse::<Team>(), Err(UnknownTeam("team_purple".into())));
    assert!("none".parse::<Team>().is_err());
}

#[test]
fn team_label_renders_none() {
    assert_eq!(team_label(None), "none");
    assert_eq!(team_label(Some(Team::Yellow)), "team_yellow");
}

#[test]
fn add_accumulates() {
    let mut ledger = ScoreLedger::new();
    assert_eq!(ledger.add(Team::Red, 1), 1);
    assert_eq!(ledger.add(Team::Red, 2), 3);
    assert_eq!(ledger.score(Team::Red), 3);
    assert_eq!(ledger.score(Team::Blue), 0);
}

#[test]
fn remove_floors_at_zero() {
    let mut ledger = ScoreLedger::new();
    ledger.add(Team::Blue, 2);
    assert_eq!(ledger.remove(Team::Blue, 5), 0);
    assert_eq!(ledger.score(Team::Blue), 0);
}

#[test]
fn record_buzzer_keeps_raw_role() {
    let mut ledger = ScoreLedger::new();
    ledger.record_buzzer(Some("team_green"));
    assert_eq!(ledger.last_buzzer_team(), Some("team_green"));
    ledger.record_buzzer(None);
    assert_eq!(ledger.last_buzzer_team(), Some("unknown"));
}

#[test]
fn reset_clears_everything() {
    let mut ledger = ScoreLedger::new();
    ledger.add(Team::Red, 3);
    ledger.record_buzzer(Some("team_red"));
    ledger.reset();
    assert!(Team::ALL.iter().all(|team| ledger.score(*team) == 0));
    assert_eq!(ledger.last_buzzer_team(), None);
}
