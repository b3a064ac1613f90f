use guide_console_core::ConsoleSnapshot;
use guide_console_core::telemetry::DashboardSnapshot;

/// Lines describing what changed between two snapshots.
pub fn diff(prev: &ConsoleSnapshot, next: &ConsoleSnapshot) -> Vec<String> {
    let mut lines = Vec::new();

    if prev.tour_state != next.tour_state || prev.current_stop != next.current_stop {
        lines.push(format!("[tour] {}{}", next.tour_state, stop_suffix(next)));
    }
    if prev.simulation_mode != next.simulation_mode {
        lines.push(format!(
            "[tour] simulation mode {}",
            if next.simulation_mode { "on" } else { "off" }
        ));
    }
    if prev.connectivity != next.connectivity {
        lines.push(format!("[voice] {}", next.connectivity));
    }
    if prev.conversation != next.conversation {
        lines.push(format!("[voice] {}", next.conversation));
    }
    if prev.mic_enabled != next.mic_enabled {
        lines.push(format!(
            "[voice] microphone {}",
            if next.mic_enabled { "on" } else { "off" }
        ));
    }

    for line in appended(&prev.user_transcript, &next.user_transcript) {
        lines.push(format!("[visitor] {line}"));
    }
    for line in appended(&prev.bot_transcript, &next.bot_transcript) {
        lines.push(format!("[guide] {line}"));
    }

    if next.errors.is_empty() && !prev.errors.is_empty() {
        lines.push("[error] log cleared".to_string());
    }
    for error in new_entries(prev, next) {
        lines.push(format!("[error] {error}"));
    }

    lines
}

/// The full console state, for the `status` command.
pub fn status(snapshot: &ConsoleSnapshot) -> Vec<String> {
    let mut lines = vec![
        format!("tour:         {}{}", snapshot.tour_state, stop_suffix(snapshot)),
        format!(
            "simulation:   {}",
            if snapshot.simulation_mode { "on" } else { "off" }
        ),
        format!(
            "voice:        {} / {}{}",
            snapshot.connectivity,
            snapshot.conversation,
            if snapshot.user_speaking { " (visitor speaking)" } else { "" }
        ),
        format!(
            "microphone:   {}",
            if snapshot.mic_enabled { "on" } else { "off" }
        ),
    ];
    if let Some(position) = &snapshot.last_position {
        lines.push(format!(
            "robot:        stop {} ({}){}",
            position.position,
            position.position_name,
            if position.is_moving { ", moving" } else { "" }
        ));
    }
    lines.push(format!("errors:       {}", snapshot.errors.len()));
    lines.extend(snapshot.errors.iter().map(|e| format!("  {e}")));
    lines
}

pub fn telemetry(snapshot: &DashboardSnapshot) -> Vec<String> {
    let or_dash = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());
    let mut lines = vec![
        format!(
            "battery:  {}",
            or_dash(snapshot.battery_percent().map(|p| format!("{p:.0}%")))
        ),
        format!("dock:     {}", or_dash(snapshot.dock_status())),
        format!(
            "velocity: {}",
            or_dash(
                snapshot
                    .linear_velocity()
                    .map(|(x, y)| format!("x={x:.2} y={y:.2}"))
            )
        ),
        format!(
            "goal:     {}",
            or_dash(snapshot.goal_xy().map(|(x, y)| format!("x={x:.2} y={y:.2}")))
        ),
    ];
    lines.extend(snapshot.errors.iter().map(|e| format!("[error] {e}")));
    lines
}

fn stop_suffix(snapshot: &ConsoleSnapshot) -> String {
    match snapshot.current_stop {
        Some(stop) => format!(" (stop {stop})"),
        None => String::new(),
    }
}

// Lines added since `prev`. After a clear the whole buffer is new.
fn appended<'a>(prev: &str, next: &'a str) -> impl Iterator<Item = &'a str> {
    let fresh = next.strip_prefix(prev).unwrap_or(next);
    fresh.lines().filter(|line| !line.is_empty())
}

// Entries appended between the two snapshots. The error log drops its
// oldest entries when full, so only the append count says what is new.
fn new_entries<'a>(prev: &ConsoleSnapshot, next: &'a ConsoleSnapshot) -> &'a [String] {
    let added = next.errors_logged.saturating_sub(prev.errors_logged);
    let added = usize::try_from(added)
        .unwrap_or(usize::MAX)
        .min(next.errors.len());
    &next.errors[next.errors.len() - added..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use guide_console_core::events::ConnectivityState;
    use guide_console_core::tour::TourState;

    fn errors(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|e| e.to_string()).collect()
    }

    fn logged(entries: &[&str], total: u64) -> ConsoleSnapshot {
        ConsoleSnapshot {
            errors: errors(entries),
            errors_logged: total,
            ..Default::default()
        }
    }

    #[test]
    fn test_state_changes_are_reported() {
        let prev = ConsoleSnapshot::default();
        let next = ConsoleSnapshot {
            tour_state: TourState::PlayingAudio,
            current_stop: Some(1),
            simulation_mode: true,
            connectivity: ConnectivityState::Connecting,
            ..Default::default()
        };
        assert_eq!(
            diff(&prev, &next),
            vec![
                "[tour] playing-audio (stop 1)",
                "[tour] simulation mode on",
                "[voice] connecting",
            ]
        );
        assert!(diff(&next, &next).is_empty());
    }

    #[test]
    fn test_only_new_transcript_lines_are_printed() {
        let prev = ConsoleSnapshot {
            bot_transcript: "Bienvenidos\n".to_string(),
            ..Default::default()
        };
        let next = ConsoleSnapshot {
            bot_transcript: "Bienvenidos\nEsta es la base uno\n".to_string(),
            user_transcript: "hola\n".to_string(),
            ..Default::default()
        };
        assert_eq!(
            diff(&prev, &next),
            vec!["[visitor] hola", "[guide] Esta es la base uno"]
        );

        // Cleared by the periodic timer: nothing to print.
        assert!(diff(&next, &ConsoleSnapshot::default()).is_empty());
    }

    #[test]
    fn test_new_errors_survive_log_rotation() {
        assert_eq!(new_entries(&logged(&["a", "b"], 2), &logged(&["a", "b", "c"], 3)), ["c"]);
        assert_eq!(
            new_entries(&logged(&["a", "b", "c"], 3), &logged(&["b", "c", "d"], 4)),
            ["d"]
        );
        assert_eq!(new_entries(&logged(&[], 0), &logged(&["x"], 1)), ["x"]);
        assert!(new_entries(&logged(&["a"], 1), &logged(&[], 1)).is_empty());
    }

    #[test]
    fn test_repeated_error_in_full_log_is_printed() {
        let full = ["robot backend unreachable"; 3];
        let prev = logged(&full, 3);
        let next = logged(&full, 5);
        assert_eq!(new_entries(&prev, &next), ["robot backend unreachable"; 2]);
        assert_eq!(
            diff(&prev, &next),
            vec![
                "[error] robot backend unreachable",
                "[error] robot backend unreachable"
            ]
        );
    }

    #[test]
    fn test_cleared_error_log_is_announced() {
        let prev = ConsoleSnapshot {
            errors: errors(&["robot backend unreachable: HTTP 503"]),
            ..Default::default()
        };
        assert_eq!(
            diff(&prev, &ConsoleSnapshot::default()),
            vec!["[error] log cleared"]
        );
    }

    #[test]
    fn test_telemetry_lines_use_dashes_for_missing_topics() {
        let snapshot = DashboardSnapshot {
            battery: Some(serde_json::json!({"percentage": 81.4})),
            ..Default::default()
        };
        assert_eq!(
            telemetry(&snapshot),
            vec!["battery:  81%", "dock:     -", "velocity: -", "goal:     -"]
        );
    }
}
