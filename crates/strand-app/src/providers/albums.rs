use std::collections::BTreeSet;
use std::rc::Rc;

use anyhow::Context;
use strand_core::*;

use crate::model::{Album, AlbumFilter, AlbumId, AlbumSort};
use crate::repository::AlbumRepository;

#[derive(Clone)]
pub struct AlbumProviders {
    pub all_albums: FutureProvider<Vec<Album>>,
    pub album_sort: StateProvider<AlbumSort>,
    pub album_filter: StateProvider<AlbumFilter>,
    /// `all_albums` filtered by `album_filter`, then ordered by `album_sort`.
    /// Empty while the library is loading or failed to load.
    pub visible_albums: Provider<Vec<Album>>,
    pub album_by_id: FutureProviderFamily<AlbumId, Option<Album>>,
    /// Distinct genres of the whole library, alphabetical.
    pub genres: Provider<Vec<String>>,
}

impl AlbumProviders {
    pub fn new(repo: Rc<dyn AlbumRepository>, default_sort: AlbumSort) -> Self {
        let all_albums = FutureProvider::new("all_albums", {
            let repo = repo.clone();
            move |_| {
                let repo = repo.clone();
                async move { repo.albums().await.context("loading albums") }
            }
        });
        let album_sort = StateProvider::new("album_sort", move |_| default_sort);
        let album_filter = StateProvider::new("album_filter", |_| AlbumFilter::default());

        let visible_albums = Provider::new("visible_albums", {
            let (all, sort, filter) = (all_albums.clone(), album_sort.clone(), album_filter.clone());
            move |r| {
                let filter = r.watch_state(&filter);
                let sort = r.watch_state(&sort);
                let mut albums: Vec<Album> = r.watch_async(&all).data_or_default();
                albums.retain(|a| filter.matches(a));
                sort.apply(&mut albums);
                albums
            }
        });

        let album_by_id = FutureProviderFamily::new("album_by_id", {
            let repo = repo.clone();
            move |_, id: AlbumId| {
                let repo = repo.clone();
                async move {
                    repo.album(id)
                        .await
                        .with_context(|| format!("loading album {id}"))
                }
            }
        });

        let genres = Provider::new("genres", {
            let all = all_albums.clone();
            move |r| {
                let albums: Vec<Album> = r.watch_async(&all).data_or_default();
                albums
                    .into_iter()
                    .map(|a| a.genre)
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            }
        });

        Self {
            all_albums,
            album_sort,
            album_filter,
            visible_albums,
            album_by_id,
            genres,
        }
    }
}
