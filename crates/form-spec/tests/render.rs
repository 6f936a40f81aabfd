use form_spec::{
    FormSession, QuestionDescriptor, QuestionResponse, RenderStatus, SubmitOutcome,
    build_render_payload, forms, render_json_ui, render_snapshot, render_text,
};

fn submitted_job(position: &str) -> FormSession {
    let mut session = FormSession::new(forms::job_application());
    session.set_field("fullName", "Ann Lee").unwrap();
    session.set_field("email", "ann@example.com").unwrap();
    session.set_field("phoneNumber", "5551234").unwrap();
    session.set_field("position", position).unwrap();
    session.set_field("relevantExperience", "4").unwrap();
    session.set_field("portfolioURL", "https://ann.design").unwrap();
    session
        .set_field("managementExperience", "Led a platform team")
        .unwrap();
    session.set_flag("additionalSkills", "JavaScript", true).unwrap();
    session.set_flag("additionalSkills", "Python", true).unwrap();
    session.set_field("interviewTime", "2026-11-02 14:30").unwrap();
    assert!(matches!(session.submit(), SubmitOutcome::Accepted(_)));
    session
}

fn summary(session: &FormSession) -> String {
    render_snapshot(session.spec(), session.snapshot().expect("snapshot")).expect("summary")
}

#[test]
fn developer_summary_lists_relevant_experience() {
    let text = summary(&submitted_job("Developer"));
    assert!(text.starts_with("Application Submitted Successfully!"));
    assert!(text.contains("Relevant Experience: 4 years"));
    assert!(!text.contains("Portfolio URL"));
    assert!(!text.contains("Management Experience"));
    assert!(text.contains("Additional Skills: JavaScript, Python"));
    assert!(text.contains("Preferred Interview Time: 11/02/2026, 02:30 PM"));
}

#[test]
fn designer_and_manager_summaries_follow_their_sections() {
    let designer = summary(&submitted_job("Designer"));
    assert!(designer.contains("Relevant Experience: 4 years"));
    assert!(designer.contains("Portfolio URL: https://ann.design"));

    let manager = summary(&submitted_job("Manager"));
    assert!(!manager.contains("Relevant Experience"));
    assert!(manager.contains("Management Experience: Led a platform team"));
}

#[test]
fn event_summary_shows_guest_only_when_attending_with_one() {
    let mut session = FormSession::new(forms::event_registration());
    session.set_field("name", "Ann").unwrap();
    session.set_field("email", "a@b.com").unwrap();
    session.set_field("age", "30").unwrap();
    session.set_field("guestName", "Bo").unwrap();
    assert!(matches!(session.submit(), SubmitOutcome::Accepted(_)));
    let text = summary(&session);
    assert!(text.contains("Attending with Guest: No"));
    assert!(!text.contains("Guest Name"));

    session.set_field("isAttendingWithGuest", true).unwrap();
    assert!(matches!(session.submit(), SubmitOutcome::Accepted(_)));
    let text = summary(&session);
    assert!(text.contains("Attending with Guest: Yes"));
    assert!(text.contains("Guest Name: Bo"));
}

#[test]
fn survey_summary_includes_additional_questions() {
    let mut session = FormSession::new(forms::survey());
    session.set_field("fullName", "Ann").unwrap();
    session.set_field("email", "a@b.com").unwrap();
    session.set_field("feedback", "q".repeat(50)).unwrap();
    let request = session.set_field("surveyTopic", "Education").unwrap().unwrap();
    session.apply_questions(QuestionResponse {
        request,
        result: Ok(vec![QuestionDescriptor {
            label: "School name".into(),
            name: "school".into(),
        }]),
    });
    session.set_field("highestQualification", "PhD").unwrap();
    session.set_field("fieldOfStudy", "Biology").unwrap();
    session.set_field("school", "Tartu").unwrap();
    assert!(matches!(session.submit(), SubmitOutcome::Accepted(_)));

    let text = summary(&session);
    assert!(text.contains("Field of Study: Biology"));
    assert!(text.contains("School name: Tartu"));
    assert!(!text.contains("Diet Preference"));
}

#[test]
fn json_ui_marks_visibility_and_errors() {
    let mut session = FormSession::new(forms::job_application());
    session.set_field("position", "Manager").unwrap();
    let _ = session.submit();

    let payload = build_render_payload(&session).expect("payload");
    assert_eq!(payload.status, RenderStatus::Invalid);
    let ui = render_json_ui(&payload);
    assert_eq!(ui["form_id"], "job-application");
    assert_eq!(ui["status"], "invalid");
    assert_eq!(ui["active_sections"][0], "management");

    let fields = ui["fields"].as_array().expect("fields");
    let portfolio = fields
        .iter()
        .find(|field| field["name"] == "portfolioURL")
        .expect("portfolio field");
    assert_eq!(portfolio["visible"], false);
    let management = fields
        .iter()
        .find(|field| field["name"] == "managementExperience")
        .expect("management field");
    assert_eq!(management["error"], "Management Experience is required");
    assert!(ui["summary"].is_null());
}

#[test]
fn text_render_lists_visible_fields() {
    let session = submitted_job("Developer");
    let payload = build_render_payload(&session).expect("payload");
    assert_eq!(payload.status, RenderStatus::Submitted);
    let text = render_text(&payload);
    assert!(text.contains("Status: submitted"));
    assert!(text.contains("relevantExperience (Relevant Experience) [required] = 4"));
    assert!(!text.contains("portfolioURL"));
    assert!(text.contains("Application Submitted Successfully!"));
}

#[test]
fn snapshot_exports_to_cbor_and_json() {
    let session = submitted_job("Designer");
    let snapshot = session.snapshot().expect("snapshot");
    let bytes = snapshot.to_cbor().expect("cbor");
    let decoded: serde_json::Value = serde_cbor::from_slice(&bytes).expect("decode");
    assert_eq!(decoded["form_id"], "job-application");
    assert_eq!(decoded["values"]["additionalSkills"]["Python"], true);
    let json = snapshot.to_json_pretty().expect("json");
    assert!(json.contains("\"portfolioURL\": \"https://ann.design\""));
}
