//! Photo resolution for feed cards.
//!
//! Resolvers are tried in order and the first hit wins:
//!
//! ```text
//!   entry photo (log photos / trip cover) ──► place photo reference ──► none
//! ```
//!
//! Resolution is a pure function of the entry's data.

use crate::entry::FeedEntry;

/// Where a card's hero image comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoSource {
    /// Directly loadable URL
    Url(String),
    /// Place-provider reference with no URL template configured
    PlaceReference(String),
}

/// One step of the photo fallback chain
pub trait PhotoResolver: Send + Sync {
    fn name(&self) -> &str;

    fn resolve(&self, entry: &FeedEntry) -> Option<PhotoSource>;
}

/// Photos the user attached: log photos, trip cover, then trip log photos
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryPhotoResolver;

impl PhotoResolver for EntryPhotoResolver {
    fn name(&self) -> &str {
        "entry"
    }

    fn resolve(&self, entry: &FeedEntry) -> Option<PhotoSource> {
        let url = match entry {
            FeedEntry::Log(log) => log.photo_urls.first().cloned(),
            FeedEntry::Trip(trip) => trip.cover_photo_url.clone().or_else(|| {
                trip.log_summaries
                    .iter()
                    .find_map(|s| s.photo_urls.first().cloned())
            }),
            FeedEntry::TripCreated(_) => None,
        };
        url.filter(|u| !u.is_empty()).map(PhotoSource::Url)
    }
}

/// Place photo reference, optionally expanded through a URL template
/// containing `{reference}`
#[derive(Debug, Clone, Default)]
pub struct PlacePhotoResolver {
    url_template: Option<String>,
}

impl PlacePhotoResolver {
    pub fn new(url_template: Option<String>) -> Self {
        Self { url_template }
    }
}

impl PhotoResolver for PlacePhotoResolver {
    fn name(&self) -> &str {
        "place"
    }

    fn resolve(&self, entry: &FeedEntry) -> Option<PhotoSource> {
        let reference = match entry {
            FeedEntry::Log(log) => log.place.photo_reference.clone(),
            FeedEntry::Trip(trip) => trip
                .log_summaries
                .iter()
                .find_map(|s| s.place.photo_reference.clone()),
            FeedEntry::TripCreated(_) => None,
        }?;

        if reference.is_empty() {
            return None;
        }

        Some(match &self.url_template {
            Some(template) => PhotoSource::Url(template.replace("{reference}", &reference)),
            None => PhotoSource::PlaceReference(reference),
        })
    }
}

/// Ordered list of resolvers
pub struct PhotoChain {
    resolvers: Vec<Box<dyn PhotoResolver>>,
}

impl PhotoChain {
    /// Chain with no resolvers; resolves nothing
    pub fn empty() -> Self {
        Self {
            resolvers: Vec::new(),
        }
    }

    /// Entry photo first, then place photo
    pub fn standard(place_url_template: Option<String>) -> Self {
        Self::empty()
            .with(EntryPhotoResolver)
            .with(PlacePhotoResolver::new(place_url_template))
    }

    pub fn with(mut self, resolver: impl PhotoResolver + 'static) -> Self {
        self.resolvers.push(Box::new(resolver));
        self
    }

    pub fn resolve(&self, entry: &FeedEntry) -> Option<PhotoSource> {
        self.resolvers.iter().find_map(|r| r.resolve(entry))
    }

    pub fn resolver_names(&self) -> Vec<&str> {
        self.resolvers.iter().map(|r| r.name()).collect()
    }
}

impl Default for PhotoChain {
    fn default() -> Self {
        Self::standard(None)
    }
}

impl std::fmt::Debug for PhotoChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhotoChain")
            .field("resolvers", &self.resolver_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Coordinates, Log, Place, TripCreation, User};
    use chrono::Utc;

    fn log(photos: Vec<&str>, reference: Option<&str>) -> Log {
        Log {
            id: "l1".into(),
            user: User {
                id: "u1".into(),
                username: "aki".into(),
                avatar_url: None,
                is_public: false,
            },
            place: Place {
                id: "p1".into(),
                name: "Senso-ji".into(),
                address: String::new(),
                coordinates: Coordinates {
                    latitude: 35.71,
                    longitude: 139.79,
                },
                photo_reference: reference.map(String::from),
                city_name: "Tokyo".into(),
            },
            rating: 5,
            note: None,
            tags: vec![],
            photo_urls: photos.into_iter().map(String::from).collect(),
            created_at: Utc::now(),
            trip_id: None,
        }
    }

    #[test]
    fn test_user_photo_wins() {
        let chain = PhotoChain::standard(None);
        let entry = FeedEntry::Log(log(vec!["https://img/1.jpg"], Some("ref-1")));
        assert_eq!(
            chain.resolve(&entry),
            Some(PhotoSource::Url("https://img/1.jpg".into()))
        );
    }

    #[test]
    fn test_falls_back_to_place_reference() {
        let chain = PhotoChain::standard(Some("https://places/photo?ref={reference}".into()));
        let entry = FeedEntry::Log(log(vec![], Some("abc")));
        assert_eq!(
            chain.resolve(&entry),
            Some(PhotoSource::Url("https://places/photo?ref=abc".into()))
        );

        let bare = PhotoChain::standard(None);
        assert_eq!(
            bare.resolve(&entry),
            Some(PhotoSource::PlaceReference("abc".into()))
        );
    }

    #[test]
    fn test_nothing_to_show() {
        let chain = PhotoChain::default();
        assert_eq!(chain.resolve(&FeedEntry::Log(log(vec![], None))), None);

        let created = FeedEntry::TripCreated(TripCreation {
            id: "c1".into(),
            user: log(vec![], None).user,
            trip_id: "t1".into(),
            trip_name: "Kyoto".into(),
            created_at: Utc::now(),
        });
        assert_eq!(chain.resolve(&created), None);
    }
}
