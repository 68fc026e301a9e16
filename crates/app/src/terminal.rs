//! Line-oriented terminal front end for a running exam session.

use exam_core::model::{ChoiceLetter, ItemStatus, SessionStatus, TestId, UserId};
use services::{
    AppServices, ExamSession, SessionCommand, SessionHandle, SessionRunner, SessionSnapshot,
};
use tokio::io::{AsyncBufReadExt, BufReader};

type DynError = Box<dyn std::error::Error>;

/// What a typed line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Command(SessionCommand),
    Help,
    Quit,
}

const HELP: &str = "\
Commands:
  start                 begin the exam
  a <letter>            select an answer
  x <letter>            eliminate / restore a choice
  f                     flag / unflag the question
  n, p                  next / previous question
  g <number>            go to question number in this module
  note <text>           replace the note for this question
  hl <text>             highlight a span
  unhl <text>           remove a highlight
  t                     show / hide the timer
  done                  finish this module
  submit                submit the exam
  review                review answers after submitting
  module <number>       switch module while reviewing
  restart               start over
  q                     leave";

/// Format seconds as `HH:MM:SS`.
pub fn format_hms(total_secs: u32) -> String {
    let hours = total_secs / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

fn parse_letter(raw: &str) -> Result<ChoiceLetter, String> {
    raw.trim()
        .parse::<ChoiceLetter>()
        .map_err(|e| e.to_string())
}

fn parse_number(raw: &str) -> Result<i64, String> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| format!("not a number: {raw}"))
}

/// Translate one input line. Item commands target the current question.
fn parse_input(line: &str, snapshot: &SessionSnapshot) -> Result<Option<Input>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    let current = || {
        snapshot
            .current
            .as_ref()
            .map(|q| q.id.clone())
            .ok_or_else(|| "no question on screen".to_string())
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "h" | "help" | "?" => return Ok(Some(Input::Help)),
        "q" | "quit" | "exit" => return Ok(Some(Input::Quit)),
        "start" => SessionCommand::Start,
        "submit" => SessionCommand::Submit,
        "review" => SessionCommand::ReopenForReview,
        "restart" => SessionCommand::Restart,
        "done" => SessionCommand::FinishModule,
        "n" | "next" => SessionCommand::Next,
        "p" | "prev" => SessionCommand::Previous,
        "t" | "timer" => SessionCommand::ToggleTimerVisibility,
        "f" | "flag" => SessionCommand::ToggleFlag(current()?),
        "a" => SessionCommand::SetAnswer(current()?, parse_letter(rest)?),
        "x" => SessionCommand::ToggleEliminate(current()?, parse_letter(rest)?),
        "g" | "go" => SessionCommand::NavigateTo(parse_number(rest)?.saturating_sub(1)),
        "module" => {
            let index = usize::try_from(parse_number(rest)?.saturating_sub(1)).unwrap_or(0);
            SessionCommand::SelectReviewModule(index)
        }
        "note" => SessionCommand::SetNote(current()?, rest.to_string()),
        "hl" => SessionCommand::AddHighlight(current()?, rest.to_string()),
        "unhl" => SessionCommand::RemoveHighlight(current()?, rest.to_string()),
        other => return Err(format!("unknown command: {other} (h for help)")),
    };
    Ok(Some(Input::Command(command)))
}

fn status_marker(status: ItemStatus) -> char {
    match status {
        ItemStatus::Flagged => 'F',
        ItemStatus::Answered => '*',
        ItemStatus::Eliminated => '-',
        ItemStatus::Unanswered => '.',
    }
}

fn timer_line(snapshot: &SessionSnapshot) -> String {
    let state = &snapshot.state;
    if !state.timer_visible {
        return "[timer hidden]".to_string();
    }
    let warning = if state.timer_warning { " !" } else { "" };
    format!("[{}{warning}]", format_hms(state.remaining_secs))
}

fn render(snapshot: &SessionSnapshot) {
    let state = &snapshot.state;
    match state.status {
        SessionStatus::Loading => println!("Loading..."),
        SessionStatus::Locked => println!("This test is locked."),
        SessionStatus::NotStarted => {
            println!("Ready: {} module(s). Type `start` to begin.", state.module_count);
        }
        SessionStatus::Submitted => {
            if let Some(score) = snapshot.score {
                println!("Submitted. Score: {score}. Type `review` to see answers.");
            }
        }
        SessionStatus::InProgress | SessionStatus::Reviewing => render_question(snapshot),
    }
}

fn render_question(snapshot: &SessionSnapshot) {
    let state = &snapshot.state;
    let progress = &snapshot.progress;
    println!();
    println!(
        "Module {}/{}  Question {}/{}  answered {}  {}",
        state.module_index + 1,
        state.module_count,
        state.question_index + 1,
        progress.total,
        progress.answered,
        if state.status == SessionStatus::Reviewing {
            "[review]".to_string()
        } else {
            timer_line(snapshot)
        },
    );

    let palette: String = snapshot
        .palette
        .iter()
        .map(|p| {
            if p.is_current {
                format!("({})", status_marker(p.status))
            } else {
                format!(" {} ", status_marker(p.status))
            }
        })
        .collect();
    println!("{palette}");

    let Some(question) = &snapshot.current else {
        return;
    };
    if let Some(passage) = &question.passage {
        println!("{passage}");
        println!();
    }
    let flag = if question.flagged { " [flagged]" } else { "" };
    println!("{}. {}{flag}", question.number, question.prompt);
    for choice in &question.choices {
        let selected = if choice.selected { '>' } else { ' ' };
        let text = if choice.eliminated {
            format!("~{}~", choice.text)
        } else {
            choice.text.clone()
        };
        println!(" {selected} {}) {text}", choice.letter);
    }
    if !question.highlights.is_empty() {
        println!("  highlights: {}", question.highlights.join(" | "));
    }
    if !question.note.is_empty() {
        println!("  note: {}", question.note);
    }
    if let Some(correct) = question.correct_answer {
        println!("  correct answer: {correct}");
        if let Some(explanation) = &question.explanation {
            println!("  {explanation}");
        }
    }
}

/// Print on every change except plain countdown ticks, which only print on
/// the minute or when the timer turns visible.
fn should_render(previous: &SessionSnapshot, next: &SessionSnapshot) -> bool {
    if next.notice.is_some() {
        return false;
    }
    let mut ticked = previous.clone();
    ticked.state.remaining_secs = next.state.remaining_secs;
    ticked.state.timer_warning = next.state.timer_warning;
    ticked.state.transitioning = next.state.transitioning;
    ticked.notice = None;
    if ticked != *next {
        return true;
    }
    next.state.timer_visible && next.state.remaining_secs % 60 == 0
}

/// Announce a move to the next module, whether by expiry or `done`.
fn module_banner(previous: &SessionSnapshot, next: &SessionSnapshot) -> Option<String> {
    let state = &next.state;
    if state.status != SessionStatus::InProgress
        || previous.state.module_index == state.module_index
    {
        return None;
    }
    Some(format!(
        "Module {} of {} has begun.",
        state.module_index + 1,
        state.module_count
    ))
}

async fn drive(handle: &SessionHandle) -> Result<(), DynError> {
    let mut updates = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last = updates.borrow_and_update().clone();
    render(&last);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let next = updates.borrow_and_update().clone();
                if let Some(notice) = &next.notice {
                    println!("! {notice}");
                }
                if let Some(banner) = module_banner(&last, &next) {
                    println!("{banner}");
                }
                if next.state.timer_warning && !last.state.timer_warning {
                    println!("Time is running low.");
                }
                if should_render(&last, &next) {
                    render(&next);
                }
                last = next;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(());
                };
                match parse_input(&line, &last) {
                    Ok(None) => {}
                    Ok(Some(Input::Help)) => println!("{HELP}"),
                    Ok(Some(Input::Quit)) => return Ok(()),
                    Ok(Some(Input::Command(command))) => handle.send(command).await?,
                    Err(message) => println!("! {message}"),
                }
            }
        }
    }
}

fn print_review(session: &ExamSession) {
    let items = session.review_items();
    if items.is_empty() {
        return;
    }
    println!();
    if let (Some(started), Some(submitted)) = (session.started_at(), session.submitted_at()) {
        let used = (submitted - started).num_seconds().max(0);
        println!("Time used: {}", format_hms(u32::try_from(used).unwrap_or(u32::MAX)));
    }
    println!("Review:");
    for item in items {
        let selected = item
            .selected_answer
            .map_or_else(|| "-".to_string(), |l| l.to_string());
        let mark = if item.is_correct { "ok" } else { "x" };
        println!(
            "  M{} Q{:<3} chose {selected}  correct {}  {mark}",
            item.module, item.number, item.correct_answer
        );
    }
}

/// Run an interactive session until the user leaves or stdin closes.
///
/// # Errors
///
/// Returns an error for stdin failures or if the runner stops unexpectedly.
pub async fn take(
    services: &AppServices,
    test_param: Option<&str>,
    user_id: Option<UserId>,
) -> Result<(), DynError> {
    let session = services.exam_loop().open(test_param, user_id).await;
    if session.status() == SessionStatus::Locked {
        let reason = session.lock_reason().map_or("unavailable", |r| r.message());
        println!("This test is locked: {reason}.");
        return Ok(());
    }
    if user_id.is_none() {
        println!("Not signed in: results will not be saved.");
    }
    println!("{HELP}");

    let handle = SessionRunner::spawn(session, services.progress_sync());
    let outcome = drive(&handle).await;
    let session = handle.leave().await?;
    print_review(&session);
    outcome
}

/// Print stored per-question results for a user and test.
///
/// # Errors
///
/// Returns an error on storage failures.
pub async fn print_results(
    services: &AppServices,
    user_id: UserId,
    test_id: &TestId,
) -> Result<(), DynError> {
    let rows = services.progress_sync().list_progress(user_id, test_id).await?;
    if rows.is_empty() {
        println!("No results for {test_id}.");
        return Ok(());
    }
    let correct = rows.iter().filter(|r| r.is_correct).count();
    for row in &rows {
        let selected = row
            .selected_answer
            .map_or_else(|| "-".to_string(), |l| l.to_string());
        println!(
            "{:<12} {selected:<2} {}  {}",
            row.question_id,
            if row.is_correct { "ok" } else { "x " },
            row.recorded_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!("{correct}/{} correct", rows.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::ExamSettings;
    use exam_core::model::{Choice, Question, QuestionId};
    use exam_core::time::fixed_clock;

    fn snapshot() -> SessionSnapshot {
        let a: ChoiceLetter = "A".parse().unwrap();
        let b: ChoiceLetter = "B".parse().unwrap();
        let question = Question::new(
            QuestionId::new("q1"),
            1,
            1,
            None,
            "Prompt",
            vec![Choice::new(a, "a"), Choice::new(b, "b")],
            a,
            None,
        )
        .unwrap();
        let mut session = ExamSession::with_questions(
            Some(TestId::new("t1")),
            None,
            vec![question],
            ExamSettings::default(),
            fixed_clock(),
        )
        .unwrap();
        session.start().unwrap();
        SessionSnapshot::capture(&session, None)
    }

    #[test]
    fn formats_hours_minutes_seconds() {
        assert_eq!(format_hms(3_840), "01:04:00");
        assert_eq!(format_hms(300), "00:05:00");
        assert_eq!(format_hms(59), "00:00:59");
        assert_eq!(format_hms(0), "00:00:00");
    }

    #[test]
    fn parses_item_commands_against_current_question() {
        let snap = snapshot();
        assert_eq!(
            parse_input("a b", &snap).unwrap(),
            Some(Input::Command(SessionCommand::SetAnswer(
                QuestionId::new("q1"),
                "B".parse().unwrap()
            )))
        );
        assert_eq!(
            parse_input("g 3", &snap).unwrap(),
            Some(Input::Command(SessionCommand::NavigateTo(2)))
        );
        assert_eq!(
            parse_input("note check units", &snap).unwrap(),
            Some(Input::Command(SessionCommand::SetNote(
                QuestionId::new("q1"),
                "check units".into()
            )))
        );
        assert_eq!(parse_input("  ", &snap).unwrap(), None);
        assert_eq!(parse_input("q", &snap).unwrap(), Some(Input::Quit));
    }

    #[test]
    fn rejects_bad_input() {
        let snap = snapshot();
        assert!(parse_input("a", &snap).is_err());
        assert!(parse_input("a bc", &snap).is_err());
        assert!(parse_input("g two", &snap).is_err());
        assert!(parse_input("dance", &snap).is_err());
    }

    #[test]
    fn extreme_numbers_clamp_instead_of_overflowing() {
        let snap = snapshot();
        assert_eq!(
            parse_input("g -9223372036854775808", &snap).unwrap(),
            Some(Input::Command(SessionCommand::NavigateTo(i64::MIN)))
        );
        assert_eq!(
            parse_input("module -9223372036854775808", &snap).unwrap(),
            Some(Input::Command(SessionCommand::SelectReviewModule(0)))
        );
        assert_eq!(
            parse_input("g 0", &snap).unwrap(),
            Some(Input::Command(SessionCommand::NavigateTo(-1)))
        );
    }

    #[test]
    fn module_banner_only_on_module_change() {
        let before = snapshot();
        let mut after = before.clone();
        assert_eq!(module_banner(&before, &after), None);

        after.state.module_index = 1;
        after.state.module_count = 2;
        assert_eq!(
            module_banner(&before, &after).as_deref(),
            Some("Module 2 of 2 has begun.")
        );

        after.state.status = SessionStatus::Submitted;
        assert_eq!(module_banner(&before, &after), None);
    }

    #[test]
    fn plain_ticks_render_only_on_the_minute() {
        let before = snapshot();
        let mut after = before.clone();
        after.state.remaining_secs -= 1;
        assert!(!should_render(&before, &after));

        after.state.remaining_secs = 3_780;
        assert!(should_render(&before, &after));

        after.state.remaining_secs = 3_779;
        after.state.question_index = 1;
        assert!(should_render(&before, &after));
    }
}
