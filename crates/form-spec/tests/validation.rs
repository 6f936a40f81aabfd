use std::collections::BTreeMap;

use form_spec::{FormSession, FormSpec, SubmitOutcome, forms, validate};

fn filled_event() -> FormSession {
    let mut session = FormSession::new(forms::event_registration());
    session.set_field("name", "Ann").unwrap();
    session.set_field("email", "a@b.com").unwrap();
    session.set_field("age", "30").unwrap();
    session
}

fn filled_job(position: &str) -> FormSession {
    let mut session = FormSession::new(forms::job_application());
    session.set_field("fullName", "Ann Lee").unwrap();
    session.set_field("email", "ann@example.com").unwrap();
    session.set_field("phoneNumber", "5551234").unwrap();
    session.set_field("position", position).unwrap();
    session.set_flag("additionalSkills", "Python", true).unwrap();
    session.set_field("interviewTime", "2026-11-02T10:00").unwrap();
    match position {
        "Developer" => {
            session.set_field("relevantExperience", "3").unwrap();
        }
        "Designer" => {
            session.set_field("relevantExperience", "5").unwrap();
            session.set_field("portfolioURL", "https://x.io").unwrap();
        }
        "Manager" => {
            session
                .set_field("managementExperience", "Ran a team of six")
                .unwrap();
        }
        _ => {}
    }
    session
}

fn filled_survey(topic: &str) -> FormSession {
    let mut session = FormSession::new(forms::survey());
    session.set_field("fullName", "Ann Lee").unwrap();
    session.set_field("email", "ann@example.com").unwrap();
    session.set_field("surveyTopic", topic).unwrap();
    session.set_field("feedback", "x".repeat(50)).unwrap();
    match topic {
        "Technology" => {
            session
                .set_field("favoriteProgrammingLanguage", "Python")
                .unwrap();
            session.set_field("yearsOfExperience", "4").unwrap();
        }
        "Health" => {
            session.set_field("exerciseFrequency", "Daily").unwrap();
            session.set_field("dietPreference", "Vegan").unwrap();
        }
        "Education" => {
            session.set_field("highestQualification", "PhD").unwrap();
            session.set_field("fieldOfStudy", "Biology").unwrap();
        }
        _ => {}
    }
    session
}

#[test]
fn complete_forms_validate_cleanly() {
    let mut sessions = vec![filled_event()];
    for position in ["Developer", "Designer", "Manager"] {
        sessions.push(filled_job(position));
    }
    for topic in ["Technology", "Health", "Education"] {
        sessions.push(filled_survey(topic));
    }

    for mut session in sessions {
        let expected = session.store().values().clone();
        let form_id = session.spec().id.clone();
        match session.submit() {
            SubmitOutcome::Accepted(snapshot) => assert_eq!(snapshot.values, expected),
            SubmitOutcome::Rejected(errors) => {
                panic!("{} rejected: {:?}", form_id, errors.messages())
            }
        }
        assert!(session.errors().is_empty());
    }
}

#[test]
fn guest_name_required_when_attending_with_guest() {
    let mut session = filled_event();
    session.set_field("isAttendingWithGuest", true).unwrap();
    session.set_field("guestName", "").unwrap();

    let errors = session.validate();
    assert_eq!(
        errors.messages(),
        BTreeMap::from([("guestName".to_string(), "Guest Name is required".to_string())])
    );
}

#[test]
fn empty_event_form_reports_every_required_field() {
    let spec = forms::event_registration();
    let store = form_spec::FieldStore::new(&spec);
    let errors = validate(&spec, &store);
    assert_eq!(errors.message("name"), Some("Name is required"));
    assert_eq!(errors.message("email"), Some("Email is required"));
    assert_eq!(errors.message("age"), Some("Age must be a number greater than 0"));
    assert!(!errors.contains("guestName"));
    assert_eq!(errors.len(), 3);
}

#[test]
fn age_must_be_positive_number() {
    for age in ["0", "-2", "abc", "  "] {
        let mut session = filled_event();
        session.set_field("age", age).unwrap();
        assert!(session.validate().contains("age"), "{age:?}");
    }
}

#[test]
fn email_needs_local_at_domain_dot_tld() {
    let mut session = filled_event();
    for (email, expected) in [
        ("ann@example", Some("Email is invalid")),
        ("ann example.com", Some("Email is invalid")),
        ("   ", Some("Email is required")),
        ("ann@example.com", None),
    ] {
        session.set_field("email", email).unwrap();
        assert_eq!(session.validate().message("email"), expected, "{email:?}");
    }
}

#[test]
fn portfolio_url_is_checked_for_designers() {
    let mut session = filled_job("Designer");
    session.set_field("portfolioURL", "not-a-url").unwrap();
    assert_eq!(
        session.validate().message("portfolioURL"),
        Some("Portfolio URL is invalid")
    );

    session.set_field("portfolioURL", "").unwrap();
    assert_eq!(
        session.validate().message("portfolioURL"),
        Some("Portfolio URL is required")
    );

    session.set_field("portfolioURL", "https://x.io").unwrap();
    assert!(!session.validate().contains("portfolioURL"));
}

#[test]
fn switching_to_developer_drops_portfolio_section() {
    let mut session = filled_job("Designer");
    session.set_field("portfolioURL", "not-a-url").unwrap();
    assert!(session.active_sections().contains("portfolio"));

    session.set_field("position", "Developer").unwrap();
    assert!(!session.active_sections().contains("portfolio"));
    assert!(session.validate().is_empty());
    assert_eq!(session.store().text("portfolioURL"), "not-a-url");
}

#[test]
fn relevant_experience_checked_for_developer_and_designer_only() {
    for position in ["Developer", "Designer"] {
        let mut session = filled_job(position);
        session.set_field("relevantExperience", "0").unwrap();
        assert_eq!(
            session.validate().message("relevantExperience"),
            Some("Relevant Experience must be a number greater than 0")
        );
    }
    let mut session = filled_job("Manager");
    session.set_field("relevantExperience", "").unwrap();
    assert!(session.validate().is_empty());
}

#[test]
fn manager_needs_management_experience() {
    let mut session = filled_job("Manager");
    session.set_field("managementExperience", "  ").unwrap();
    assert_eq!(
        session.validate().message("managementExperience"),
        Some("Management Experience is required")
    );
}

#[test]
fn phone_number_is_strictly_numeric() {
    let mut session = filled_job("Developer");
    for phone in ["555-1234", "(555) 1234", "", "call me"] {
        session.set_field("phoneNumber", phone).unwrap();
        assert_eq!(
            session.validate().message("phoneNumber"),
            Some("Phone Number must be a valid number"),
            "{phone:?}"
        );
    }
    session.set_field("phoneNumber", " 5551234 ").unwrap();
    assert!(!session.validate().contains("phoneNumber"));
}

#[test]
fn skills_and_interview_time_are_required() {
    let mut session = filled_job("Developer");
    session.set_flag("additionalSkills", "Python", false).unwrap();
    session
        .set_field_json("interviewTime", &serde_json::Value::Null)
        .unwrap();
    let errors = session.validate();
    assert_eq!(
        errors.message("additionalSkills"),
        Some("At least one skill must be selected")
    );
    assert_eq!(
        errors.message("interviewTime"),
        Some("Preferred Interview Time is required")
    );
}

#[test]
fn survey_topic_sections_have_their_own_requirements() {
    let cases = [
        ("Technology", vec!["favoriteProgrammingLanguage", "yearsOfExperience"]),
        ("Health", vec!["dietPreference", "exerciseFrequency"]),
        ("Education", vec!["fieldOfStudy", "highestQualification"]),
    ];
    for (topic, expected) in cases {
        let mut session = FormSession::new(forms::survey());
        session.set_field("fullName", "Ann").unwrap();
        session.set_field("email", "a@b.com").unwrap();
        session.set_field("surveyTopic", topic).unwrap();
        session.set_field("feedback", "y".repeat(60)).unwrap();
        let errors = session.validate();
        let fields: Vec<&str> = errors.iter().map(|error| error.field.as_str()).collect();
        assert_eq!(fields, expected, "{topic}");
    }

    let session = FormSession::new(forms::survey());
    assert_eq!(
        session.validate().message("surveyTopic"),
        Some("Survey Topic is required")
    );
}

#[test]
fn feedback_needs_fifty_trimmed_characters() {
    let mut session = filled_survey("Health");
    session.set_field("feedback", "f".repeat(49)).unwrap();
    assert_eq!(
        session.validate().message("feedback"),
        Some("Feedback is required and must be at least 50 characters")
    );

    session
        .set_field("feedback", format!("  {}  ", "f".repeat(49)))
        .unwrap();
    assert!(session.validate().contains("feedback"));

    session.set_field("feedback", "f".repeat(50)).unwrap();
    assert!(!session.validate().contains("feedback"));
}

#[test]
fn validation_is_idempotent() {
    let mut session = filled_job("Designer");
    session.set_field("portfolioURL", "ftp//broken").unwrap();
    session.set_field("email", "nope").unwrap();
    let first = session.validate();
    let second = session.validate();
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
}

#[test]
fn custom_spec_uses_the_same_engine() {
    let spec: FormSpec = forms::load_spec(
        r#"{
            "id": "rsvp",
            "title": "RSVP",
            "version": "0.1.0",
            "sections": [
                { "id": "diet", "active_if": { "op": "truthy", "field": "staying" } }
            ],
            "fields": [
                { "name": "staying", "label": "Staying for dinner", "type": "boolean" },
                {
                    "name": "allergies", "label": "Allergies", "type": "text", "section": "diet",
                    "rules": [{ "rule": "min_length", "min": 3, "message": "Say a bit more" }]
                }
            ]
        }"#,
    )
    .expect("spec");
    let mut session = FormSession::new(spec);
    assert!(session.validate().is_empty());
    session.set_field("staying", true).unwrap();
    assert_eq!(session.validate().message("allergies"), Some("Say a bit more"));
}
