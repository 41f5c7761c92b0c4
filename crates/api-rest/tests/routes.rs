use api_rest::error::PROVIDER_WITHOUT_ROLES;
use api_rest::{router, AppState};
use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use osler_core::records::{
    ActionItemInput, PatientInput, ProviderInput, ProviderType, ProviderTypeInput,
};
use osler_core::{ActingProvider, Author, Clinic, CoreConfig, NonEmptyText, TodoKind};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const USER: &str = "alice";

struct TestApp {
    _temp: TempDir,
    clinic: Clinic,
    app: Router,
}

fn setup() -> TestApp {
    let temp = TempDir::new().unwrap();
    let cfg = CoreConfig::new(
        temp.path().to_path_buf(),
        NonEmptyText::new("Test Clinic").unwrap(),
        None,
        TodoKind::ALL.to_vec(),
    )
    .unwrap();
    let clinic = Clinic::open(Arc::new(cfg)).unwrap();
    clinic
        .staff
        .add_user(&Author::system(), USER, "alice@example.org")
        .unwrap();
    let app = router(AppState::new(clinic.clone()));
    TestApp {
        _temp: temp,
        clinic,
        app,
    }
}

fn role(clinic: &Clinic, long_name: &str, short_name: &str) -> ProviderType {
    clinic
        .staff
        .create_provider_type(
            &Author::system(),
            ProviderTypeInput {
                long_name: long_name.into(),
                short_name: short_name.into(),
                signs_charts: false,
                staff_view: false,
            },
        )
        .unwrap()
}

fn give_provider(clinic: &Clinic, roles: &[&ProviderType]) {
    let user = clinic.staff.user(USER).unwrap();
    clinic
        .staff
        .create_provider(
            &user,
            ProviderInput {
                first_name: "Alice".into(),
                middle_name: None,
                last_name: "Smith".into(),
                phone: None,
                gender: None,
                languages: vec![],
                clinical_roles: roles.iter().map(|r| r.id).collect(),
            },
        )
        .unwrap();
}

fn acting(clinic: &Clinic, role: &ProviderType) -> ActingProvider {
    let user = clinic.staff.user(USER).unwrap();
    let provider = clinic.staff.provider_for_user(USER).unwrap();
    ActingProvider::new(&user, &provider, role)
}

fn patient(clinic: &Clinic, first: &str, last: &str) -> osler_core::records::Patient {
    clinic
        .patients
        .create(
            &Author::system(),
            PatientInput {
                first_name: first.into(),
                middle_name: None,
                last_name: last.into(),
                phone: None,
                gender: None,
                date_of_birth: chrono::NaiveDate::from_ymd_opt(1980, 1, 2).unwrap(),
                languages: vec![],
                ethnicities: vec![],
                address: None,
                city: None,
                state: None,
                zip_code: None,
                country: None,
                pcp_preferred_zip: None,
                preferred_contact_method: None,
                patient_comfortable_with_english: true,
                case_managers: vec![],
            },
        )
        .unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut req = Request::get(uri).header("x-osler-user", USER);
    if let Some(cookie) = cookie {
        req = req.header(COOKIE, cookie);
    }
    req.body(Body::empty()).unwrap()
}

fn post_form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut req = Request::post(uri)
        .header("x-osler-user", USER)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        req = req.header(COOKIE, cookie);
    }
    req.body(Body::from(body.to_string())).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.unwrap()
}

fn location(resp: &Response) -> String {
    resp.headers()
        .get(LOCATION)
        .expect("redirect location")
        .to_str()
        .unwrap()
        .to_string()
}

fn session_cookie(resp: &Response) -> String {
    resp.headers()
        .get(SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

async fn json(resp: Response) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn text(resp: Response) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// A provider with a single role, selected for a session. Returns the session cookie.
async fn signed_in(t: &TestApp) -> (ProviderType, String) {
    let volunteer = role(&t.clinic, "Volunteer", "Vol");
    give_provider(&t.clinic, &[&volunteer]);
    let resp = send(&t.app, get("/choose-role?next=/patients", None)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    (volunteer, session_cookie(&resp))
}

fn today() -> String {
    chrono::Local::now().date_naive().format("%Y-%m-%d").to_string()
}

#[tokio::test]
async fn health_answers_without_a_user() {
    let t = setup();
    let req = Request::get("/health").body(Body::empty()).unwrap();
    let resp = send(&t.app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json(resp).await["ok"], true);
}

#[tokio::test]
async fn requests_need_a_known_user() {
    let t = setup();
    let anonymous = Request::get("/patients").body(Body::empty()).unwrap();
    assert_eq!(send(&t.app, anonymous).await.status(), StatusCode::UNAUTHORIZED);

    let stranger = Request::get("/patients")
        .header("x-osler-user", "mallory")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&t.app, stranger).await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn home_redirects_to_the_dashboard() {
    let t = setup();
    let resp = send(&t.app, get("/", None)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/patients");
}

#[tokio::test]
async fn single_role_is_selected_without_asking() {
    let t = setup();
    let volunteer = role(&t.clinic, "Volunteer", "Vol");
    give_provider(&t.clinic, &[&volunteer]);

    let resp = send(&t.app, get("/choose-role?next=/appointments", None)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/appointments");
    assert!(session_cookie(&resp).starts_with("osler_session="));
}

#[tokio::test]
async fn unsafe_next_falls_back_to_home() {
    let t = setup();
    let volunteer = role(&t.clinic, "Volunteer", "Vol");
    give_provider(&t.clinic, &[&volunteer]);

    let resp = send(&t.app, get("/choose-role?next=https://evil.test/", None)).await;
    assert_eq!(location(&resp), "/");
}

#[tokio::test]
async fn several_roles_are_offered_then_chosen() {
    let t = setup();
    let attending = role(&t.clinic, "Attending Physician", "Attending");
    let volunteer = role(&t.clinic, "Volunteer", "Vol");
    give_provider(&t.clinic, &[&attending, &volunteer]);

    let resp = send(&t.app, get("/choose-role?next=/patients", None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get(SET_COOKIE).is_none());
    let body = json(resp).await;
    assert_eq!(body["choice_key"], "radio-roles");
    assert_eq!(body["roles"].as_array().unwrap().len(), 2);

    let form = format!("radio-roles={}", attending.id);
    let resp = send(&t.app, post_form("/choose-role?next=/patients", &form, None)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/patients");
    let cookie = session_cookie(&resp);

    // The chosen role now authorises writes.
    let p = patient(&t.clinic, "Ana", "Lopez");
    let resp = send(
        &t.app,
        post_form(&format!("/patients/{}/activate", p.id), "", Some(&cookie)),
    )
    .await;
    assert_eq!(location(&resp), format!("/patients/{}", p.id));
}

#[tokio::test]
async fn a_role_removed_from_the_profile_no_longer_authorises_writes() {
    let t = setup();
    let attending = role(&t.clinic, "Attending Physician", "Attending");
    let volunteer = role(&t.clinic, "Volunteer", "Vol");
    give_provider(&t.clinic, &[&attending, &volunteer]);
    let p = patient(&t.clinic, "Ana", "Lopez");

    let form = format!("radio-roles={}", attending.id);
    let resp = send(&t.app, post_form("/choose-role", &form, None)).await;
    let cookie = session_cookie(&resp);

    let form = format!("first_name=Alice&last_name=Smith&clinical_roles={}", volunteer.id);
    let resp = send(&t.app, post_form("/providers/me", &form, Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let url = format!("/patients/{}/action-items/new", p.id);
    let item = format!("due_date={}&instruction=Call", today());
    let resp = send(&t.app, post_form(&url, &item, Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert!(location(&resp).starts_with("/choose-role?next="));
    assert!(t.clinic.notes.action_items(&p.id).unwrap().is_empty());

    // The one remaining role is selected on the next visit to the role choice.
    let resp = send(&t.app, get("/choose-role", Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let resp = send(&t.app, post_form(&url, &item, Some(&cookie))).await;
    assert_eq!(location(&resp), format!("/patients/{}", p.id));
    let items = t.clinic.notes.action_items(&p.id).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].meta.author_type, volunteer.id);
}

#[tokio::test]
async fn a_session_cannot_be_reused_by_another_user() {
    let t = setup();
    let (volunteer, cookie) = signed_in(&t).await;
    let p = patient(&t.clinic, "Ana", "Lopez");

    let bob = t
        .clinic
        .staff
        .add_user(&Author::system(), "bob", "bob@example.org")
        .unwrap();
    t.clinic
        .staff
        .create_provider(
            &bob,
            ProviderInput {
                first_name: "Bob".into(),
                middle_name: None,
                last_name: "Jones".into(),
                phone: None,
                gender: None,
                languages: vec![],
                clinical_roles: vec![volunteer.id],
            },
        )
        .unwrap();

    let req = Request::post(format!("/patients/{}/activate", p.id))
        .header("x-osler-user", "bob")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let resp = send(&t.app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert!(location(&resp).starts_with("/choose-role?next="));
    assert!(t.clinic.patients.get(&p.id).unwrap().needs_workup);
}

#[tokio::test]
async fn choosing_a_role_the_provider_lacks_is_rejected() {
    let t = setup();
    let volunteer = role(&t.clinic, "Volunteer", "Vol");
    let other = role(&t.clinic, "Attending Physician", "Attending");
    give_provider(&t.clinic, &[&volunteer]);

    let form = format!("radio-roles={}", other.id);
    let resp = send(&t.app, post_form("/choose-role", &form, None)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn provider_without_roles_is_a_fatal_error() {
    let t = setup();
    let volunteer = role(&t.clinic, "Volunteer", "Vol");
    give_provider(&t.clinic, &[&volunteer]);
    let role_file = t
        .clinic
        .cfg()
        .staff_dir()
        .join("provider_types")
        .join(format!("{}.yaml", volunteer.id));
    std::fs::remove_file(role_file).unwrap();

    let resp = send(&t.app, get("/choose-role", None)).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(text(resp).await, PROVIDER_WITHOUT_ROLES);
}

#[tokio::test]
async fn writes_without_a_provider_go_to_provider_creation() {
    let t = setup();
    let resp = send(&t.app, post_form("/intake", "first_name=Ana", None)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/providers/new?next=%2Fintake");
}

#[tokio::test]
async fn writes_without_a_role_go_to_role_choice() {
    let t = setup();
    let volunteer = role(&t.clinic, "Volunteer", "Vol");
    give_provider(&t.clinic, &[&volunteer]);

    let resp = send(&t.app, post_form("/intake", "first_name=Ana", None)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/choose-role?next=%2Fintake");
}

#[tokio::test]
async fn creating_a_provider_redirects_to_next() {
    let t = setup();
    let volunteer = role(&t.clinic, "Volunteer", "Vol");

    let resp = send(&t.app, get("/providers/new", None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json(resp).await["provider_types"][0]["short_name"], "Vol");

    let form = format!(
        "first_name=Alice&last_name=Smith&languages=English,Spanish&clinical_roles={}",
        volunteer.id
    );
    let resp = send(&t.app, post_form("/providers/new?next=/intake", &form, None)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/intake");

    let provider = t.clinic.staff.provider_for_user(USER).unwrap();
    assert_eq!(provider.languages, vec!["English", "Spanish"]);
    let user = t.clinic.staff.user(USER).unwrap();
    assert_eq!(user.display_name.as_deref(), Some("Alice Smith"));
}

#[tokio::test]
async fn providers_needing_an_update_are_sent_to_their_profile() {
    let t = setup();
    let (volunteer, cookie) = signed_in(&t).await;
    t.clinic
        .staff
        .require_providers_update(&Author::system())
        .unwrap();

    let resp = send(&t.app, post_form("/intake", "", Some(&cookie))).await;
    assert_eq!(location(&resp), "/providers/me?next=%2Fintake");

    let form = format!("first_name=Alicia&last_name=Smith&clinical_roles={}", volunteer.id);
    let resp = send(&t.app, post_form("/providers/me?next=/intake", &form, Some(&cookie))).await;
    assert_eq!(location(&resp), "/intake");
    assert!(!t.clinic.staff.provider_for_user(USER).unwrap().needs_updating);
}

#[tokio::test]
async fn pre_intake_without_duplicates_goes_to_intake() {
    let t = setup();
    let resp = send(
        &t.app,
        post_form("/pre-intake", "first_name=ana&last_name=LOPEZ", None),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/intake?first_name=Ana&last_name=Lopez");
}

#[tokio::test]
async fn pre_intake_with_duplicates_goes_to_selection() {
    let t = setup();
    let existing = patient(&t.clinic, "Anna", "Lopez");

    let resp = send(
        &t.app,
        post_form("/pre-intake", "first_name=ana&last_name=lopez", None),
    )
    .await;
    let target = location(&resp);
    assert_eq!(target, "/pre-intake-select?first_name=Ana&last_name=Lopez");

    let body = json(send(&t.app, get(&target, None)).await).await;
    assert_eq!(body["object_list"][0]["id"], existing.id.to_string());
    assert_eq!(body["new_pt_url"], "/intake?first_name=Ana&last_name=Lopez");
    assert_eq!(body["home"], "/");

    let body = json(send(&t.app, get("/pre-intake-select?first_name=Ana", None)).await).await;
    assert!(body["object_list"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn intake_creates_the_patient_and_continues_to_demographics() {
    let t = setup();
    let (_, cookie) = signed_in(&t).await;

    let resp = send(
        &t.app,
        post_form(
            "/intake",
            "first_name=Ana&last_name=Lopez&date_of_birth=1980-01-02&languages=Spanish",
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let patients = t.clinic.patients.list();
    assert_eq!(patients.len(), 1);
    let id = patients[0].id;
    assert_eq!(location(&resp), format!("/patients/{id}/demographics"));

    let context = json(send(&t.app, get(&location(&resp), Some(&cookie))).await).await;
    assert_eq!(context["patient"]["first_name"], "Ana");
    assert!(context["demographics"].is_null());

    let resp = send(
        &t.app,
        post_form(
            &format!("/patients/{id}/demographics/new"),
            "has_insurance=no&dependents=2&chronic_conditions=Diabetes",
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(location(&resp), format!("/patients/{id}"));
    let again = send(
        &t.app,
        post_form(&format!("/patients/{id}/demographics/new"), "", Some(&cookie)),
    )
    .await;
    assert_eq!(again.status(), StatusCode::CONFLICT);

    let history = json(send(&t.app, get(&format!("/patients/{id}/history"), None)).await).await;
    assert_eq!(history[0]["author_role"], "Vol");
    assert_eq!(history.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn updating_a_patient_returns_to_their_detail() {
    let t = setup();
    let (_, cookie) = signed_in(&t).await;
    let p = patient(&t.clinic, "Ana", "Lopez");

    let resp = send(
        &t.app,
        post_form(
            &format!("/patients/{}/update", p.id),
            "first_name=Ana&last_name=Lopez-Garcia&date_of_birth=1980-01-02&languages=Spanish",
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), format!("/patients/{}", p.id));

    let updated = t.clinic.patients.get(&p.id).unwrap();
    assert_eq!(updated.last_name.as_str(), "Lopez-Garcia");
    assert_eq!(updated.languages, vec!["Spanish".to_string()]);
}

#[tokio::test]
async fn marking_an_action_item_done_asks_for_a_followup() {
    let t = setup();
    let (_, cookie) = signed_in(&t).await;
    let p = patient(&t.clinic, "Ana", "Lopez");

    let form = format!("due_date={}&instruction=Call+about+labs&priority=on", today());
    let resp = send(
        &t.app,
        post_form(&format!("/patients/{}/action-items/new", p.id), &form, Some(&cookie)),
    )
    .await;
    assert_eq!(location(&resp), format!("/patients/{}", p.id));

    let detail = json(send(&t.app, get(&format!("/patients/{}", p.id), None)).await).await;
    assert_eq!(detail["total_ais"], 1);
    assert_eq!(detail["todo_sections"][0]["title"], "Active Action Items");
    assert_eq!(detail["todo_sections"][0]["link"], "done");
    let ai = detail["todo_sections"][0]["items"][0]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let resp = send(
        &t.app,
        post_form(&format!("/patients/{}/action-items/{ai}/done", p.id), "", Some(&cookie)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let followup_url = format!("/patients/{}/action-items/{ai}/followups/new", p.id);
    assert_eq!(location(&resp), followup_url);

    let context = json(send(&t.app, get(&followup_url, None)).await).await;
    assert!(!context["action_item"]["completion_date"].is_null());

    let resp = send(
        &t.app,
        post_form(
            &followup_url,
            "contact_method=Phone&contact_resolution=Reached",
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(location(&resp), format!("/patients/{}", p.id));

    let detail = json(send(&t.app, get(&format!("/patients/{}", p.id), None)).await).await;
    assert_eq!(detail["todo_sections"][2]["title"], "Completed Action Items");
    assert_eq!(detail["todo_sections"][2]["items"].as_array().unwrap().len(), 1);
    assert_eq!(detail["total_followups"], 1);
}

#[tokio::test]
async fn action_item_for_a_missing_patient_is_not_found() {
    let t = setup();
    let (_, cookie) = signed_in(&t).await;
    let missing = osler_core::ShardableUuid::new();

    let form = format!("due_date={}&instruction=Call", today());
    let resp = send(
        &t.app,
        post_form(&format!("/patients/{missing}/action-items/new"), &form, Some(&cookie)),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reset_clears_completion() {
    let t = setup();
    let (volunteer, cookie) = signed_in(&t).await;
    let p = patient(&t.clinic, "Ana", "Lopez");
    let acting = acting(&t.clinic, &volunteer);
    let item = t
        .clinic
        .notes
        .create_action_item(
            &acting,
            &p.id,
            ActionItemInput {
                due_date: chrono::Local::now().date_naive(),
                instruction: "Call".into(),
                comments: String::new(),
                priority: false,
            },
        )
        .unwrap();
    t.clinic
        .notes
        .mark_action_item_done(&acting, &p.id, &item.meta.id)
        .unwrap();

    let url = format!("/patients/{}/action-items/{}/reset", p.id, item.meta.id);
    let resp = send(&t.app, post_form(&url, "", Some(&cookie))).await;
    assert_eq!(location(&resp), format!("/patients/{}", p.id));
    let item = t.clinic.notes.action_item(&p.id, &item.meta.id).unwrap();
    assert!(item.completion_date.is_none());
}

#[tokio::test]
async fn referral_contact_updates_the_referral_status() {
    let t = setup();
    let (_, cookie) = signed_in(&t).await;
    let p = patient(&t.clinic, "Ana", "Lopez");

    let form = format!("kind=Primary+care&is_fqhc=on&locations=Clinic+A&due_date={}", today());
    let resp = send(
        &t.app,
        post_form(&format!("/patients/{}/referrals/new", p.id), &form, Some(&cookie)),
    )
    .await;
    assert_eq!(location(&resp), format!("/patients/{}", p.id));

    let detail = json(send(&t.app, get(&format!("/patients/{}", p.id), None)).await).await;
    assert_eq!(detail["referral_status"], "Pending");
    assert_eq!(detail["referrals"].as_array().unwrap().len(), 1);

    let referral = t.clinic.notes.referrals(&p.id).unwrap().remove(0);
    let request = t.clinic.notes.followup_requests(&p.id).unwrap().remove(0);
    let url = format!(
        "/patients/{}/referrals/{}/followup-requests/{}/contacts/new",
        p.id, referral.meta.id, request.meta.id
    );
    let resp = send(
        &t.app,
        post_form(
            &url,
            "contact_method=Phone&patient_reached=on&has_appointment=yes&pt_showed=yes",
            Some(&cookie),
        ),
    )
    .await;
    assert_eq!(location(&resp), format!("/patients/{}", p.id));

    let detail = json(send(&t.app, get(&format!("/patients/{}", p.id), None)).await).await;
    assert_eq!(detail["referral_status"], "Successful");
    assert_eq!(detail["referral_followups"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn appointments_are_listed_from_today() {
    let t = setup();
    let (_, cookie) = signed_in(&t).await;
    let p = patient(&t.clinic, "Ana", "Lopez");

    let today = today();
    for (date, time) in [("2000-01-01", "09:00"), (today.as_str(), "10:30")] {
        let form = format!("clindate={date}&clintime={time}&appointment_type=chronic_care");
        let resp = send(
            &t.app,
            post_form(&format!("/patients/{}/appointments/new", p.id), &form, Some(&cookie)),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    }

    let upcoming = json(send(&t.app, get("/appointments", None)).await).await;
    let days = upcoming.as_array().unwrap();
    assert_eq!(days.len(), 1);
    assert_eq!(days[0]["date"], today);

    let detail = json(send(&t.app, get(&format!("/patients/{}", p.id), None)).await).await;
    assert_eq!(detail["appointments"][0]["title"], "Future Appointments");
    assert_eq!(detail["appointments"][1]["title"], "Past Appointments");
    assert_eq!(detail["appointments"][1]["appointments"][0]["clindate"], "2000-01-01");

    let past = t
        .clinic
        .notes
        .appointments(&p.id)
        .unwrap()
        .into_iter()
        .find(|a| a.clindate.to_string() == "2000-01-01")
        .unwrap();
    let url = format!("/patients/{}/appointments/{}/no-show", p.id, past.meta.id);
    send(&t.app, post_form(&url, "", Some(&cookie))).await;
    let past = t
        .clinic
        .notes
        .appointments(&p.id)
        .unwrap()
        .into_iter()
        .find(|a| a.meta.id == past.meta.id)
        .unwrap();
    assert_eq!(past.pt_showed, Some(false));
}

#[tokio::test]
async fn patient_list_filters() {
    let t = setup();
    let (_, cookie) = signed_in(&t).await;
    let active = patient(&t.clinic, "Ana", "Lopez");
    let inactive = patient(&t.clinic, "Ben", "Adams");
    send(
        &t.app,
        post_form(&format!("/patients/{}/activate-home", inactive.id), "", Some(&cookie)),
    )
    .await;

    let all = json(send(&t.app, get("/patients", None)).await).await;
    assert_eq!(all["patients"][0]["last_name"], "Adams");
    assert_eq!(all["patients"].as_array().unwrap().len(), 2);

    let listed = json(send(&t.app, get("/patients/list?filter=active", None)).await).await;
    let patients = listed["patients"].as_array().unwrap();
    assert_eq!(patients.len(), 1);
    assert_eq!(patients[0]["id"], active.id.to_string());

    let resp = send(&t.app, get("/patients/list?filter=nonsense", None)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn documents_are_uploaded_and_downloaded() {
    let t = setup();
    let (_, cookie) = signed_in(&t).await;
    let p = patient(&t.clinic, "Ana", "Lopez");

    let body = "--XBOUNDARY\r\n\
        Content-Disposition: form-data; name=\"title\"\r\n\r\n\
        Lab results\r\n\
        --XBOUNDARY\r\n\
        Content-Disposition: form-data; name=\"document_type\"\r\n\r\n\
        Labs\r\n\
        --XBOUNDARY\r\n\
        Content-Disposition: form-data; name=\"file\"; filename=\"labs.txt\"\r\n\
        Content-Type: text/plain\r\n\r\n\
        hello world\r\n\
        --XBOUNDARY--\r\n";
    let req = Request::post(format!("/patients/{}/documents/new", p.id))
        .header("x-osler-user", USER)
        .header(COOKIE, &cookie)
        .header(CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
        .body(Body::from(body))
        .unwrap();
    let resp = send(&t.app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), format!("/patients/{}", p.id));

    let document = t.clinic.notes.documents(&p.id).unwrap().remove(0);
    let detail_url = format!("/patients/{}/documents/{}", p.id, document.meta.id);
    let detail = json(send(&t.app, get(&detail_url, None)).await).await;
    assert_eq!(detail["title"], "Lab results");

    let resp = send(&t.app, get(&format!("{detail_url}/file"), None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(text(resp).await, "hello world");

    let resp = send(
        &t.app,
        post_form(&detail_url, "title=Blood+panel&document_type=Labs", Some(&cookie)),
    )
    .await;
    assert_eq!(location(&resp), detail_url);
    let updated = t.clinic.notes.document(&p.id, &document.meta.id).unwrap();
    assert_eq!(updated.title.as_str(), "Blood panel");
}

#[tokio::test]
async fn vaccine_followup_needs_a_dose_date_for_the_next_dose() {
    let t = setup();
    let (_, cookie) = signed_in(&t).await;
    let p = patient(&t.clinic, "Ana", "Lopez");
    let url = format!("/patients/{}/vaccine-followups/new", p.id);

    let resp = send(&t.app, post_form(&url, "subsequent_dose=on", Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let form = format!("subsequent_dose=on&dose_date={}", today());
    let resp = send(&t.app, post_form(&url, &form, Some(&cookie))).await;
    assert_eq!(location(&resp), format!("/patients/{}", p.id));
    assert_eq!(t.clinic.notes.vaccine_followups(&p.id).unwrap().len(), 1);
}
