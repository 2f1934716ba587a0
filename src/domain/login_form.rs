use scraper::{Html, Selector};
use thiserror::Error;

// The portal renders the request verification token as the first input
// inside the login form container.
const LOGIN_FORM_INPUT_SELECTOR: &str = ".login-form > input";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginFormToken {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoginFormError {
    #[error("login form input not found in page")]
    FormNotFound,
    #[error("login form input is missing the '{0}' attribute")]
    MissingAttribute(&'static str),
}

pub fn extract_login_token(html: &str) -> Result<LoginFormToken, LoginFormError> {
    let document = Html::parse_document(html);
    let selector =
        Selector::parse(LOGIN_FORM_INPUT_SELECTOR).expect("static selector should parse");

    let input = document
        .select(&selector)
        .next()
        .ok_or(LoginFormError::FormNotFound)?;

    let name = input
        .value()
        .attr("name")
        .ok_or(LoginFormError::MissingAttribute("name"))?;
    let value = input
        .value()
        .attr("value")
        .ok_or(LoginFormError::MissingAttribute("value"))?;

    Ok(LoginFormToken {
        name: name.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{LoginFormError, LoginFormToken, extract_login_token};

    #[test]
    fn extracts_token_from_first_form_input() {
        let html = r#"
            <html><body>
            <form method="post" action="/log-in">
              <div class="login-form">
                <input name="__RequestVerificationToken" type="hidden" value="abc123">
                <input name="Username" type="text" value="">
              </div>
            </form>
            </body></html>
        "#;

        let token = extract_login_token(html).expect("token should be extracted");

        assert_eq!(
            token,
            LoginFormToken {
                name: "__RequestVerificationToken".to_string(),
                value: "abc123".to_string(),
            }
        );
    }

    #[test]
    fn fails_when_login_form_is_missing() {
        let html = "<html><body><p>maintenance page</p></body></html>";

        assert_eq!(extract_login_token(html), Err(LoginFormError::FormNotFound));
    }

    #[test]
    fn fails_when_token_input_has_no_value() {
        let html = r#"
            <div class="login-form">
              <input name="__RequestVerificationToken" type="hidden">
            </div>
        "#;

        assert_eq!(
            extract_login_token(html),
            Err(LoginFormError::MissingAttribute("value"))
        );
    }

    #[test]
    fn fails_when_token_input_has_no_name() {
        let html = r#"
            <div class="login-form">
              <input type="hidden" value="abc123">
            </div>
        "#;

        assert_eq!(
            extract_login_token(html),
            Err(LoginFormError::MissingAttribute("name"))
        );
    }
}
