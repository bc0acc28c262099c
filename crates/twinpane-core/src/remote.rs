use std::future::Future;
use std::time::Duration;

use anyhow::{
  Context,
  bail
};
use tracing::{
  debug,
  info,
  instrument,
  warn
};

use crate::config::Config;
use crate::post::Post;

pub const DEFAULT_POSTS_URL: &str =
  "https://jsonplaceholder.typicode.com/posts";

/// Where the browser gets its snapshot.
/// Implementations perform at most one
/// request per call and never retry.
pub trait PostSource {
  fn fetch_posts(
    &self
  ) -> impl Future<
    Output = anyhow::Result<Vec<Post>>
  >;
}

#[derive(Debug, Clone)]
pub struct HttpPostSource {
  client: reqwest::Client,
  url:    String
}

impl HttpPostSource {
  pub fn new(
    url: impl Into<String>,
    timeout: Option<Duration>
  ) -> anyhow::Result<Self> {
    let url = url.into();
    if url.trim().is_empty() {
      bail!("posts URL is empty");
    }

    let mut builder =
      reqwest::Client::builder();
    if let Some(timeout) = timeout {
      builder = builder.timeout(timeout);
    }
    let client =
      builder.build().context(
        "failed building HTTP client \
         for posts"
      )?;

    Ok(Self {
      client,
      url
    })
  }

  pub fn with_client(
    client: reqwest::Client,
    url: impl Into<String>
  ) -> Self {
    Self {
      client,
      url: url.into()
    }
  }

  pub fn from_config(
    cfg: &Config
  ) -> anyhow::Result<Self> {
    let url = cfg
      .get("posts.url")
      .unwrap_or_else(|| {
        DEFAULT_POSTS_URL.to_string()
      });
    let timeout = cfg
      .get_u64("posts.timeout_secs")?
      .map(Duration::from_secs);
    Self::new(url, timeout)
  }
}

impl PostSource for HttpPostSource {
  #[instrument(skip(self), fields(url = %self.url))]
  async fn fetch_posts(
    &self
  ) -> anyhow::Result<Vec<Post>> {
    info!("fetching posts");

    let response = self
      .client
      .get(self.url.as_str())
      .header(
        reqwest::header::ACCEPT,
        "application/json"
      )
      .send()
      .await
      .with_context(|| {
        format!(
          "failed requesting {}",
          self.url
        )
      })?;

    let status = response.status();
    if !status.is_success() {
      warn!(
        status = status.as_u16(),
        "posts endpoint returned \
         non-success status"
      );
      bail!(
        "HTTP error! status: {}",
        status.as_u16()
      );
    }

    let body =
      response.text().await.with_context(
        || {
          format!(
            "failed reading response \
             body from {}",
            self.url
          )
        }
      )?;
    let posts: Vec<Post> =
      serde_json::from_str(&body)
        .with_context(|| {
          format!(
            "failed decoding posts \
             from {}",
            self.url
          )
        })?;

    debug!(
      count = posts.len(),
      "decoded posts"
    );
    Ok(posts)
  }
}
