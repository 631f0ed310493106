use librato_common::UnixTimestamp;
use librato_metrics::sanitize;
use serde::{Deserialize, Serialize};

/// Maximum length of an annotation title.
const MAX_TITLE_LENGTH: usize = 255;

/// A reference to an external resource associated with an annotation.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct AnnotationLink {
    /// The URL of the resource.
    pub href: String,
    /// A human readable label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// The relation of the resource to the annotation, such as `github`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
}

impl AnnotationLink {
    /// Creates a link without label or relation.
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            label: None,
            rel: None,
        }
    }
}

/// Options of an out-of-band event marker, such as a deployment.
///
/// ```
/// use librato_client::{Annotation, AnnotationLink};
///
/// let annotation = Annotation::new()
///     .description("Deployed 9b562b2")
///     .stream_name("deployments")
///     .link(AnnotationLink::new("https://ci.example.com/builds/42"));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Annotation {
    /// Extra information about the event.
    pub description: Option<String>,
    /// The time at which the event started. Defaults to the time of the call.
    pub start_time: Option<UnixTimestamp>,
    /// The time at which the event ended, for events with a duration.
    pub end_time: Option<UnixTimestamp>,
    /// The stream the annotation is filed under. Defaults to a stream derived from the title.
    pub stream_name: Option<String>,
    /// Links to associated resources.
    pub links: Vec<AnnotationLink>,
    /// The member of a population that emitted the event.
    pub source: Option<String>,
}

impl Annotation {
    /// Creates empty annotation options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the start time.
    pub fn start_time(mut self, time: UnixTimestamp) -> Self {
        self.start_time = Some(time);
        self
    }

    /// Sets the end time.
    pub fn end_time(mut self, time: UnixTimestamp) -> Self {
        self.end_time = Some(time);
        self
    }

    /// Sets the stream name.
    pub fn stream_name(mut self, name: impl Into<String>) -> Self {
        self.stream_name = Some(name.into());
        self
    }

    /// Adds a link.
    pub fn link(mut self, link: AnnotationLink) -> Self {
        self.links.push(link);
        self
    }

    /// Sets the source.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Resolves the stream name and builds the request body.
    pub(crate) fn into_request(self, title: &str, now: UnixTimestamp) -> AnnotationRequest {
        let stream = match self.stream_name {
            Some(name) if !name.is_empty() => name,
            _ => sanitize::sanitize_stream_name(title),
        };

        let payload = AnnotationPayload {
            title: title.chars().take(MAX_TITLE_LENGTH).collect(),
            description: self.description,
            start_time: self.start_time.unwrap_or(now),
            end_time: self.end_time,
            source: self.source,
            links: self.links,
        };

        AnnotationRequest { stream, payload }
    }
}

/// The JSON body posted to the annotations endpoint.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnnotationPayload {
    /// The title, truncated to 255 characters.
    pub title: String,
    /// Extra information about the event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The time at which the event started.
    pub start_time: UnixTimestamp,
    /// The time at which the event ended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<UnixTimestamp>,
    /// The member of a population that emitted the event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Links to associated resources.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<AnnotationLink>,
}

/// An annotation ready to be sent.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct AnnotationRequest {
    pub stream: String,
    pub payload: AnnotationPayload,
}
