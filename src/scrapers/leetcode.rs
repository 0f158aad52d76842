//! LeetCode scraper.
//!
//! Logs in with the site's form endpoint, reads the solved set off the
//! algorithms problem listing, then walks the submission history newest
//! first to recover when each problem was first accepted. The site only
//! reports relative times ("2 days, 21 hours ago"), so submit times are
//! resolved against the wall clock at fetch time.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::models::{Candidate, CandidateTime};

use super::{JudgeSession, ScrapeError, Scraper};

const HOST: &str = "https://leetcode.com";
const LOGIN_PATH: &str = "/accounts/login/";
const BAD_CREDENTIALS: &str = "The login and/or password you specified are not correct";

pub struct LeetCodeScraper {
    session: JudgeSession,
    username: String,
    password: String,
    zone: Tz,
}

/// A solved problem from the listing page, annotated with the relative
/// time of its earliest accepted submission once the history walk finds it.
struct AcceptedProblem {
    path: String,
    problem_id: String,
    title: String,
    observed_ago: Option<String>,
}

/// One row of the submission history table.
struct SubmissionRow {
    path: String,
    ago: String,
    accepted: bool,
}

impl LeetCodeScraper {
    pub fn from_config(config: &SourceConfig) -> Result<Self, ScrapeError> {
        let username = config
            .username
            .clone()
            .ok_or(ScrapeError::MissingOption("username"))?;
        let password = config
            .password
            .clone()
            .ok_or(ScrapeError::MissingOption("password"))?;
        let zone = match config.timezone.as_deref() {
            Some(label) => label.parse().map_err(|_| ScrapeError::InvalidOption {
                option: "timezone",
                value: label.to_string(),
            })?,
            None => Tz::UTC,
        };
        Ok(Self {
            session: JudgeSession::new(HOST)?,
            username,
            password,
            zone,
        })
    }

    async fn login(&self) -> Result<(), ScrapeError> {
        let response = self.session.get(LOGIN_PATH).await?;
        let csrf = response
            .cookies()
            .find(|cookie| cookie.name() == "csrftoken")
            .map(|cookie| cookie.value().to_string())
            .ok_or_else(|| ScrapeError::Auth {
                site: "leetcode".into(),
                reason: "no csrf cookie on login page".into(),
            })?;

        let response = self
            .session
            .post_form(
                LOGIN_PATH,
                &[
                    ("login", self.username.as_str()),
                    ("password", self.password.as_str()),
                    ("csrfmiddlewaretoken", csrf.as_str()),
                ],
            )
            .await?;

        // Bad credentials come back as a 200 with an inline form error.
        let body = response.text().await?;
        if body.contains(BAD_CREDENTIALS) {
            return Err(ScrapeError::Auth {
                site: "leetcode".into(),
                reason: BAD_CREDENTIALS.into(),
            });
        }
        debug!("logged in to leetcode");
        Ok(())
    }
}

#[async_trait]
impl Scraper for LeetCodeScraper {
    fn name(&self) -> &str {
        "leetcode"
    }

    async fn fetch(&self, stop_hint: Option<&str>) -> Result<Vec<Candidate>, ScrapeError> {
        self.login().await?;

        let listing = self.session.get_text("/problemset/algorithms/").await?;
        let mut accepted = parse_accepted_problems(&listing);
        if accepted.is_empty() {
            info!("no accepted problems on leetcode");
            return Ok(Vec::new());
        }

        'pages: for page in 1u32.. {
            let body = self
                .session
                .get_text(&format!("/submissions/{page}/"))
                .await?;
            let rows = parse_submission_rows(&body);
            if rows.is_empty() {
                break;
            }
            for row in rows {
                if !row.accepted {
                    continue;
                }
                let Some(problem) = accepted.iter_mut().find(|p| p.path == row.path) else {
                    continue;
                };
                if stop_hint == Some(problem.problem_id.as_str()) {
                    debug!(page, problem_id = %problem.problem_id, "reached already-stored submission");
                    break 'pages;
                }
                // Walking newest first, so keep overwriting: the last
                // sighting is the earliest accepted submission.
                problem.observed_ago = Some(row.ago);
            }
        }

        let now = Utc::now();
        let mut candidates = Vec::new();
        for problem in accepted {
            // Solved problems whose accepted submission never showed up in
            // the walk (older than the stop hint) are skipped.
            let Some(ago) = problem.observed_ago else {
                continue;
            };
            let submit_time = parse_relative_time(&ago, now)
                .ok_or_else(|| ScrapeError::Parse(format!("unparseable submit time '{ago}'")))?;
            candidates.push(Candidate {
                problem_id: problem.problem_id,
                title: problem.title,
                url: self.session.absolute(&problem.path)?.to_string(),
                submit_time: CandidateTime::Zoned(submit_time.with_timezone(&self.zone)),
            });
        }
        info!(count = candidates.len(), "fetched accepted submissions from leetcode");
        Ok(candidates)
    }
}

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector")
}

fn cell_text(cell: &ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Solved problems off the algorithms listing. A problem counts as solved
/// when its status cell carries the "ac" marker.
fn parse_accepted_problems(html: &str) -> Vec<AcceptedProblem> {
    let document = Html::parse_document(html);
    let row_sel = selector("#problemList > tbody > tr");
    let cell_sel = selector("td");
    let span_sel = selector("span");
    let link_sel = selector("a");

    let mut problems = Vec::new();
    for row in document.select(&row_sel) {
        let cells: Vec<_> = row.select(&cell_sel).collect();
        if cells.len() < 3 {
            continue;
        }
        let solved = cells[0]
            .select(&span_sel)
            .next()
            .map(|span| span.value().classes().any(|class| class == "ac"))
            .unwrap_or(false);
        if !solved {
            continue;
        }
        let Some(link) = cells[2].select(&link_sel).next() else {
            continue;
        };
        let Some(path) = link.value().attr("href") else {
            continue;
        };
        problems.push(AcceptedProblem {
            path: path.to_string(),
            problem_id: cell_text(&cells[1]),
            title: cell_text(&link),
            observed_ago: None,
        });
    }
    problems
}

/// Rows of one submission history page, newest first.
fn parse_submission_rows(html: &str) -> Vec<SubmissionRow> {
    let document = Html::parse_document(html);
    let row_sel = selector("#result_testcases > tbody > tr");
    let cell_sel = selector("td");
    let link_sel = selector("a");

    let mut rows = Vec::new();
    for row in document.select(&row_sel) {
        let cells: Vec<_> = row.select(&cell_sel).collect();
        if cells.len() < 3 {
            continue;
        }
        let Some(link) = cells[1].select(&link_sel).next() else {
            continue;
        };
        let Some(path) = link.value().attr("href") else {
            continue;
        };
        let accepted = cells[2]
            .select(&link_sel)
            .next()
            .map(|status| status.value().classes().any(|class| class == "status-accepted"))
            .unwrap_or(false);
        rows.push(SubmissionRow {
            path: path.to_string(),
            ago: cell_text(&cells[0]),
            accepted,
        });
    }
    rows
}

/// Resolve a relative time like "2 days, 21 hours ago" against `now`.
fn parse_relative_time(ago: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let stripped = ago.trim().strip_suffix("ago").unwrap_or(ago).trim();
    if stripped.is_empty() {
        return None;
    }
    let mut total = Duration::zero();
    for part in stripped.split(',') {
        let mut words = part.split_whitespace();
        let amount: i64 = words.next()?.parse().ok()?;
        let span = match words.next()?.trim_end_matches('s') {
            "second" => Duration::seconds(amount),
            "minute" => Duration::minutes(amount),
            "hour" => Duration::hours(amount),
            "day" => Duration::days(amount),
            "week" => Duration::weeks(amount),
            "month" => Duration::days(30 * amount),
            "year" => Duration::days(365 * amount),
            _ => return None,
        };
        total += span;
    }
    Some(now - total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn relative_times_resolve() {
        assert_eq!(
            parse_relative_time("2 days, 21 hours ago", now()),
            Some(Utc.with_ymd_and_hms(2024, 5, 7, 15, 0, 0).unwrap())
        );
        assert_eq!(
            parse_relative_time("1 minute ago", now()),
            Some(Utc.with_ymd_and_hms(2024, 5, 10, 11, 59, 0).unwrap())
        );
        assert_eq!(
            parse_relative_time("3 weeks ago", now()),
            Some(Utc.with_ymd_and_hms(2024, 4, 19, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn garbage_relative_times_are_rejected() {
        assert_eq!(parse_relative_time("yesterday", now()), None);
        assert_eq!(parse_relative_time("2 fortnights ago", now()), None);
        assert_eq!(parse_relative_time("", now()), None);
    }

    #[test]
    fn solved_problems_are_extracted() {
        let html = r##"
            <table id="problemList"><tbody>
              <tr>
                <td><span class="ac"></span></td>
                <td>1</td>
                <td><a href="/problems/two-sum/">Two Sum</a></td>
              </tr>
              <tr>
                <td><span class="notac"></span></td>
                <td>2</td>
                <td><a href="/problems/add-two-numbers/">Add Two Numbers</a></td>
              </tr>
            </tbody></table>
        "##;
        let problems = parse_accepted_problems(html);
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].problem_id, "1");
        assert_eq!(problems[0].title, "Two Sum");
        assert_eq!(problems[0].path, "/problems/two-sum/");
    }

    #[test]
    fn submission_rows_carry_status() {
        let html = r##"
            <table id="result_testcases"><tbody>
              <tr>
                <td>2 hours ago</td>
                <td><a href="/problems/two-sum/">Two Sum</a></td>
                <td><a class="status-accepted" href="/submissions/detail/1/">Accepted</a></td>
              </tr>
              <tr>
                <td>3 hours ago</td>
                <td><a href="/problems/two-sum/">Two Sum</a></td>
                <td><a class="status-wrong" href="/submissions/detail/2/">Wrong Answer</a></td>
              </tr>
            </tbody></table>
        "##;
        let rows = parse_submission_rows(html);
        assert_eq!(rows.len(), 2);
        assert!(rows[0].accepted);
        assert_eq!(rows[0].ago, "2 hours ago");
        assert!(!rows[1].accepted);
    }
}
