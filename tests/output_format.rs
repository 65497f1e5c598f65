use boardsync::output::HumanReport;

#[test]
fn render_lays_out_fields_lines_warnings_and_hint() {
    let mut human = HumanReport::new("boardsync replay: tasks?workspace=ws1");
    human
        .field("committed", 0)
        .field("rolled back", 1)
        .line("line 1: start t1")
        .line("order T1: t1, t2, t3")
        .warn("could not save order: Persistence failed: rejected")
        .hint("boardsync show tasks?workspace=ws1");

    let expected = "\
boardsync replay: tasks?workspace=ws1
  committed: 0
  rolled back: 1

  line 1: start t1
  order T1: t1, t2, t3

warning: could not save order: Persistence failed: rejected
hint: boardsync show tasks?workspace=ws1";
    assert_eq!(human.render(), expected);
    assert_eq!(human.warnings().len(), 1);
}

#[test]
fn render_of_bare_report_is_its_title() {
    let human = HumanReport::new("boardsync show: workspaces");
    assert_eq!(human.render(), "boardsync show: workspaces");
}

#[test]
fn later_hint_replaces_earlier() {
    let mut human = HumanReport::new("boardsync tag add: t2");
    human.field("status", "saved").hint("first").hint("second");
    let text = human.render();
    assert!(text.ends_with("\n\nhint: second"));
    assert!(!text.contains("first"));
}
