//! Response assembly: embedded HTML documents, placeholder substitution,
//! and the fixed security header set attached to every response.

use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

const SECURITY_HEADERS: [(&str, &str); 5] = [
    ("X-Content-Type-Options", "nosniff"),
    ("X-Frame-Options", "DENY"),
    ("X-XSS-Protection", "1; mode=block"),
    (
        "Strict-Transport-Security",
        "max-age=31536000; includeSubDomains; preload",
    ),
    (
        "Content-Security-Policy",
        "default-src 'self'; script-src 'self' 'unsafe-inline'; style-src 'self' 'unsafe-inline';",
    ),
];

/// Attach the fixed security header set. Applied to every response,
/// including errors and the 404 page, via `map_response`.
pub async fn attach_security_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    response
}

/// HTML response with the given status.
pub fn html(status: StatusCode, body: impl Into<String>) -> Response {
    (
        status,
        [(CONTENT_TYPE, "text/html; charset=utf-8")],
        body.into(),
    )
        .into_response()
}

/// 302 redirect; axum's `Redirect` uses 303/307, the panel contract is 302.
pub fn redirect(location: &'static str) -> Response {
    (
        StatusCode::FOUND,
        [(LOCATION, HeaderValue::from_static(location))],
        Body::empty(),
    )
        .into_response()
}

/// Fill the panel template. Single pass over the template, first occurrence
/// per placeholder, non-recursive: a stored address containing `{{origin}}`
/// is emitted verbatim.
pub fn render_panel(dohaddress: &str, origin: &str) -> String {
    substitute(
        PANEL_HTML,
        &[("{{dohaddress}}", dohaddress), ("{{origin}}", origin)],
    )
}

fn substitute(template: &str, replacements: &[(&str, &str)]) -> String {
    let mut slots: Vec<(usize, &str, &str)> = replacements
        .iter()
        .filter_map(|(placeholder, value)| {
            template
                .find(placeholder)
                .map(|at| (at, *placeholder, *value))
        })
        .collect();
    slots.sort_by_key(|(at, _, _)| *at);

    let mut out = String::with_capacity(template.len());
    let mut cursor = 0;
    for (at, placeholder, value) in slots {
        if at < cursor {
            continue;
        }
        out.push_str(&template[cursor..at]);
        out.push_str(value);
        cursor = at + placeholder.len();
    }
    out.push_str(&template[cursor..]);
    out
}

pub const PANEL_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Azadi DNS Panel</title>
  <style>
    body { font-family: Arial, sans-serif; background: #121212; color: #fff; display: flex; flex-direction: column; align-items: center; justify-content: center; height: 100vh; margin: 0; }
    .card { background: #1e1e1e; padding: 20px; border-radius: 8px; width: 100%; max-width: 400px; text-align: center; margin-top: 10px; }
    input { width: calc(100% - 20px); padding: 10px; margin-bottom: 10px; border: 1px solid #333; border-radius: 4px; background: #2e2e2e; color: #fff; }
    button { padding: 10px 20px; background: #007bff; color: #fff; border: none; border-radius: 4px; cursor: pointer; margin: 5px; }
  </style>
</head>
<body>
  <div class="card">
    <h1>Azadi DNS Panel</h1>
    <form id="dohForm">
      <label for="dohaddress">DNS over HTTPS Address:</label>
      <input type="text" id="dohaddress" name="dohaddress" value="{{dohaddress}}" required>
      <button type="submit">Save</button>
      <button type="button" id="resetButton">Reset to Default</button>
    </form>
    <label for="relay">Relay endpoint:</label>
    <input type="text" id="relay" value="{{origin}}/dns-query" readonly>
  </div>
  <div class="card">
    <button id="changePasswordButton">Change Password</button>
    <button id="logoutButton">Logout</button>
  </div>
  <script>
    document.getElementById('dohForm').addEventListener('submit', async (event) => {
      event.preventDefault();
      const dohaddress = document.getElementById('dohaddress').value;
      const response = await fetch('/set-doh-address', {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify({ dohaddress }),
      });
      alert(await response.text());
    });
    document.getElementById('resetButton').addEventListener('click', async () => {
      const response = await fetch('/reset-doh-address', { method: 'POST' });
      alert(await response.text());
      if (response.ok) window.location.reload();
    });
    document.getElementById('changePasswordButton').addEventListener('click', () => {
      window.location.href = '/change-password';
    });
    document.getElementById('logoutButton').addEventListener('click', async () => {
      const response = await fetch('/logout', { method: 'POST' });
      if (response.ok) window.location.href = '/login';
    });
  </script>
</body>
</html>
"#;

pub const LOGIN_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Login</title>
  <style>
    body { font-family: Arial, sans-serif; background: #121212; color: #fff; display: flex; align-items: center; justify-content: center; height: 100vh; margin: 0; }
    .card { background: #1e1e1e; padding: 20px; border-radius: 8px; width: 100%; max-width: 400px; text-align: center; }
    input { width: calc(100% - 20px); padding: 10px; margin-bottom: 10px; border: 1px solid #333; border-radius: 4px; background: #2e2e2e; color: #fff; }
    button { padding: 10px 20px; background: #007bff; color: #fff; border: none; border-radius: 4px; cursor: pointer; }
    .message { margin-top: 20px; color: #f00; }
  </style>
</head>
<body>
  <div class="card">
    <h1>Login</h1>
    <form id="loginForm">
      <input type="password" id="password" placeholder="Password" required>
      <button type="submit">Login</button>
    </form>
    <div class="message" id="message"></div>
  </div>
  <script>
    document.getElementById('loginForm').addEventListener('submit', async (event) => {
      event.preventDefault();
      const password = document.getElementById('password').value;
      const response = await fetch('/login', {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify({ password }),
      });
      if (response.ok) {
        window.location.href = '/';
      } else {
        document.getElementById('message').textContent = await response.text();
        document.getElementById('password').value = '';
      }
    });
  </script>
</body>
</html>
"#;

pub const SET_PASSWORD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Set Password</title>
  <style>
    body { font-family: Arial, sans-serif; background: #121212; color: #fff; display: flex; align-items: center; justify-content: center; height: 100vh; margin: 0; }
    .card { background: #1e1e1e; padding: 20px; border-radius: 8px; width: 100%; max-width: 400px; text-align: center; }
    input { width: calc(100% - 20px); padding: 10px; margin-bottom: 10px; border: 1px solid #333; border-radius: 4px; background: #2e2e2e; color: #fff; }
    button { padding: 10px 20px; background: #007bff; color: #fff; border: none; border-radius: 4px; cursor: pointer; }
    .message { margin-top: 20px; color: #f00; }
  </style>
</head>
<body>
  <div class="card">
    <h1>Set Password</h1>
    <form id="passwordForm">
      <input type="password" id="password" placeholder="Password" required>
      <input type="password" id="confirmPassword" placeholder="Confirm Password" required>
      <button type="submit">Set Password</button>
    </form>
    <div class="message" id="message"></div>
  </div>
  <script>
    document.getElementById('passwordForm').addEventListener('submit', async (event) => {
      event.preventDefault();
      const password = document.getElementById('password').value;
      const confirmPassword = document.getElementById('confirmPassword').value;
      const response = await fetch('/set-password', {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify({ password, confirmPassword }),
      });
      if (response.ok) {
        window.location.href = '/login';
      } else {
        document.getElementById('message').textContent = await response.text();
      }
    });
  </script>
</body>
</html>
"#;

pub const CHANGE_PASSWORD_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Change Password</title>
  <style>
    body { font-family: Arial, sans-serif; background: #121212; color: #fff; display: flex; align-items: center; justify-content: center; height: 100vh; margin: 0; }
    .card { background: #1e1e1e; padding: 20px; border-radius: 8px; width: 100%; max-width: 400px; text-align: center; }
    input { width: calc(100% - 20px); padding: 10px; margin-bottom: 10px; border: 1px solid #333; border-radius: 4px; background: #2e2e2e; color: #fff; }
    button { padding: 10px 20px; background: #007bff; color: #fff; border: none; border-radius: 4px; cursor: pointer; }
    .message { margin-top: 20px; color: #f00; }
  </style>
</head>
<body>
  <div class="card">
    <h1>Change Password</h1>
    <form id="changePasswordForm">
      <input type="password" id="currentPassword" placeholder="Current Password" required>
      <input type="password" id="newPassword" placeholder="New Password" required>
      <input type="password" id="confirmNewPassword" placeholder="Confirm New Password" required>
      <button type="submit">Change Password</button>
    </form>
    <div class="message" id="message"></div>
  </div>
  <script>
    document.getElementById('changePasswordForm').addEventListener('submit', async (event) => {
      event.preventDefault();
      const currentPassword = document.getElementById('currentPassword').value;
      const newPassword = document.getElementById('newPassword').value;
      const confirmNewPassword = document.getElementById('confirmNewPassword').value;
      const response = await fetch('/change-password', {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify({ currentPassword, newPassword, confirmNewPassword }),
      });
      if (response.ok) {
        window.location.href = '/';
      } else {
        document.getElementById('message').textContent = await response.text();
      }
    });
  </script>
</body>
</html>
"#;

pub const NOT_FOUND_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <title>Not Found</title>
  <style>
    body { font-family: Arial, sans-serif; background: #121212; color: #fff; display: flex; align-items: center; justify-content: center; height: 100vh; margin: 0; }
    .card { background: #1e1e1e; padding: 20px; border-radius: 8px; max-width: 400px; text-align: center; }
  </style>
</head>
<body>
  <div class="card">
    <h1>Not Found</h1>
    <p>The page you are looking for does not exist.</p>
  </div>
</body>
</html>
"#;

pub const STORE_ERROR_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <title>Error</title>
  <style>
    body { font-family: Arial, sans-serif; background: #121212; color: #fff; display: flex; align-items: center; justify-content: center; height: 100vh; margin: 0; }
    .card { background: #1e1e1e; padding: 20px; border-radius: 8px; max-width: 400px; text-align: center; }
  </style>
</head>
<body>
  <div class="card">
    <h1>Error</h1>
    <p>The settings store is not configured. Please check the data directory.</p>
  </div>
</body>
</html>
"#;
