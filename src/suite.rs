//! The reqres scenarios: user creation and the registration paths.

use crate::model::CreateUserBody;
use crate::model::RegistrationBody;
use crate::scenario::Expectation;
use crate::scenario::Field;
use crate::scenario::Scenario;
use crate::spec::BAD_REQUEST;
use crate::spec::CREATE_USER;
use crate::spec::CREATED;
use crate::spec::OK;
use crate::spec::REGISTER;
use crate::spec::SpecError;
use crate::spec::SpecRegistry;

pub const KNOWN_EMAIL: &str = "eve.holt@reqres.in";
pub const KNOWN_PASSWORD: &str = "pistol";
pub const KNOWN_ID: &str = "4";
pub const UNKNOWN_EMAIL: &str = "123test@bk.ru";

pub const MISSING_EMAIL_OR_USERNAME: &str = "Missing email or username";
pub const MISSING_PASSWORD: &str = "Missing password";
pub const ONLY_DEFINED_USERS: &str = "Note: Only defined users succeed registration";

/// Builds every scenario of the suite. Fails if the registry lacks one of
/// the specifications a scenario needs.
pub fn reqres_scenarios(registry: &SpecRegistry) -> Result<Vec<Scenario>, SpecError> {
    Ok(vec![
        successful_create_user(registry)?,
        successful_register(registry)?,
        empty_registration(registry)?,
        missing_password(registry)?,
        undefined_email(registry)?,
    ])
}

pub fn successful_create_user(registry: &SpecRegistry) -> Result<Scenario, SpecError> {
    let body = CreateUserBody {
        name: "bond".into(),
        job: "qa".into(),
    };

    Ok(Scenario::post(
        "successful_create_user",
        "Create a new user",
        "/users",
        registry.request(CREATE_USER)?,
        registry.response(CREATED)?,
    )
    .body(&body)?
    .step("Check the new user's name", Expectation::equals(Field::Name, "bond"))
    .step("Check the new user's job", Expectation::equals(Field::Job, "qa"))
    .step("Check an id was assigned", Expectation::Present(Field::Id))
    .step(
        "Check the creation time was recorded",
        Expectation::Timestamp(Field::CreatedAt),
    ))
}

pub fn successful_register(registry: &SpecRegistry) -> Result<Scenario, SpecError> {
    let body = RegistrationBody::default()
        .email(KNOWN_EMAIL)
        .password(KNOWN_PASSWORD);

    Ok(Scenario::post(
        "successful_register",
        "Register a defined user",
        "/register",
        registry.request(REGISTER)?,
        registry.response(OK)?,
    )
    .body(&body)?
    .step("Check the id", Expectation::equals(Field::Id, KNOWN_ID))
    .step("Check the token", Expectation::NonEmpty(Field::Token)))
}

/// Sends no body at all.
pub fn empty_registration(registry: &SpecRegistry) -> Result<Scenario, SpecError> {
    Ok(Scenario::post(
        "empty_registration",
        "Register without email and password",
        "/register",
        registry.request(REGISTER)?,
        registry.response(BAD_REQUEST)?,
    )
    .step(
        "Check the error message",
        Expectation::equals(Field::Error, MISSING_EMAIL_OR_USERNAME),
    ))
}

pub fn missing_password(registry: &SpecRegistry) -> Result<Scenario, SpecError> {
    let body = RegistrationBody::default().email(KNOWN_EMAIL);

    Ok(Scenario::post(
        "missing_password",
        "Register without a password",
        "/register",
        registry.request(REGISTER)?,
        registry.response(BAD_REQUEST)?,
    )
    .body(&body)?
    .step(
        "Check the error message",
        Expectation::equals(Field::Error, MISSING_PASSWORD),
    ))
}

pub fn undefined_email(registry: &SpecRegistry) -> Result<Scenario, SpecError> {
    let body = RegistrationBody::default()
        .email(UNKNOWN_EMAIL)
        .password(KNOWN_PASSWORD);

    Ok(Scenario::post(
        "undefined_email",
        "Register a user with an undefined email",
        "/register",
        registry.request(REGISTER)?,
        registry.response(BAD_REQUEST)?,
    )
    .body(&body)?
    .step(
        "Check the error message",
        Expectation::equals(Field::Error, ONLY_DEFINED_USERS),
    ))
}

/// Keeps the scenarios whose name contains one of `patterns`. No patterns
/// keeps everything.
pub fn select(scenarios: Vec<Scenario>, patterns: &[String]) -> Vec<Scenario> {
    if patterns.is_empty() {
        return scenarios;
    }

    scenarios
        .into_iter()
        .filter(|s| patterns.iter().any(|p| s.name.contains(p.as_str())))
        .collect()
}
