use shared::models::*;
use time::format_description::well_known::Rfc3339;

pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<link rel="stylesheet" href="/static/style.css">
</head>
<body>
<main>
{body}
</main>
</body>
</html>
"#,
        title = escape(title),
        body = body,
    )
}

fn timestamp(survey_time: &time::OffsetDateTime) -> String {
    survey_time.format(&Rfc3339).unwrap_or_default()
}

pub fn home_page(recent: &[Survey]) -> String {
    let history = if recent.is_empty() {
        "<p class=\"muted\">No surveys yet.</p>".to_string()
    } else {
        let items: String = recent
            .iter()
            .map(|survey| {
                format!(
                    "<li><a href=\"/surveys/{id}\">{question}</a> <a class=\"muted\" href=\"/surveys/{id}/results\">results</a> <time>{created}</time></li>\n",
                    id = survey.id,
                    question = escape(&survey.question),
                    created = timestamp(&survey.created_at),
                )
            })
            .collect();
        format!("<ul class=\"history\">\n{items}</ul>")
    };

    layout(
        "Create a survey",
        &format!(
            r#"<h1>Create a survey</h1>
<form method="post" action="/surveys">
<label for="question">Question</label>
<input id="question" name="question" type="text" maxlength="{max}" required autofocus>
<button type="submit">Create</button>
</form>
<h2>Recent surveys</h2>
{history}"#,
            max = shared::MAX_QUESTION_LENGTH,
        ),
    )
}

pub fn created_page(survey: &Survey, vote_url: &str, results_url: &str, qr: &str) -> String {
    layout(
        "Survey created",
        &format!(
            r#"<h1>Survey created</h1>
<p class="question">{question}</p>
<p>Survey id: <code>{id}</code></p>
<img class="qr" src="{qr}" alt="QR code for {vote_url}">
<p>Voting link: <a href="{vote_url}">{vote_url}</a></p>
<p>Results: <a href="{results_url}">{results_url}</a></p>
<p><a href="/">Create another survey</a></p>"#,
            question = escape(&survey.question),
            id = survey.id,
            qr = qr,
            vote_url = escape(vote_url),
            results_url = escape(results_url),
        ),
    )
}

pub fn vote_page(survey: &SurveyResults, vote_url: &str, qr: &str) -> String {
    let buttons: String = Choice::ALL
        .iter()
        .map(|choice| {
            format!(
                "<button type=\"submit\" name=\"choice\" value=\"{}\">{}</button>\n",
                choice.field(),
                choice.label()
            )
        })
        .collect();

    layout(
        &survey.question,
        &format!(
            r#"<h1>{question}</h1>
<form method="post" action="/surveys/{id}/vote" class="ballot">
{buttons}</form>
<img class="qr" src="{qr}" alt="QR code for {vote_url}">
<p>Share: <a href="{vote_url}">{vote_url}</a></p>
<p><a href="/surveys/{id}/results">See results</a></p>"#,
            question = escape(&survey.question),
            id = survey.id,
            buttons = buttons,
            qr = qr,
            vote_url = escape(vote_url),
        ),
    )
}

pub fn results_page(results: &SurveyResults) -> String {
    let tally = results.tally();
    let rows: String = Choice::ALL
        .iter()
        .map(|&choice| {
            let percent = tally.percent(choice);
            format!(
                r#"<div class="row"><span class="label">{label}</span><div class="bar"><div class="fill" style="width: {percent:.1}%"></div></div><span class="votes">{votes} ({percent:.1}%)</span></div>
"#,
                label = choice.label(),
                votes = tally.get(choice),
                percent = percent,
            )
        })
        .collect();

    layout(
        &format!("Results: {}", results.question),
        &format!(
            r#"<h1>{question}</h1>
<div class="results">
{rows}</div>
<p class="total">Total votes: <strong>{count}</strong></p>
<p><a href="/surveys/{id}">Vote</a> · <a href="/">Home</a></p>"#,
            question = escape(&results.question),
            rows = rows,
            count = results.count,
            id = results.id,
        ),
    )
}

pub fn error_page(status: u16, message: &str) -> String {
    layout(
        "Error",
        &format!(
            r#"<h1>{status}</h1>
<p>{message}</p>
<p><a href="/">Back to home</a></p>"#,
            status = status,
            message = escape(message),
        ),
    )
}
