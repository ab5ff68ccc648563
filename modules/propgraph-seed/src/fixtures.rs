//! Sample movie-rating dataset.

use propgraph_common::{NodeMatcher, NodeSpec, PropertyMap};

pub const USER: &str = "user";
pub const MOVIE: &str = "movie";
pub const RATED: &str = "rated";

pub struct User {
    pub name: &'static str,
    pub user_id: &'static str,
}

pub struct Movie {
    pub title: &'static str,
    pub movie_id: i64,
    pub year: i64,
    pub plot: &'static str,
}

pub struct Rating {
    pub user: &'static str,
    pub movie: &'static str,
    pub rating: i64,
    pub timestamp: i64,
}

pub const USERS: &[User] = &[
    User { name: "darrel", user_id: "1" },
    User { name: "Alice", user_id: "2" },
    User { name: "Bob", user_id: "3" },
    User { name: "Charlie", user_id: "4" },
    User { name: "Dave", user_id: "5" },
];

pub const MOVIES: &[Movie] = &[
    Movie {
        title: "be quiet and drive",
        movie_id: 1,
        year: 2000,
        plot: "que rolon",
    },
    Movie {
        title: "The Shawshank Redemption",
        movie_id: 2,
        year: 1994,
        plot: "Two imprisoned men bond over a number of years, finding solace and eventual redemption through acts of common decency.",
    },
    Movie {
        title: "The Godfather",
        movie_id: 3,
        year: 1972,
        plot: "An organized crime dynasty's aging patriarch transfers control of his clandestine empire to his reluctant son.",
    },
    Movie {
        title: "The Dark Knight",
        movie_id: 4,
        year: 2008,
        plot: "When the menace known as the Joker wreaks havoc and chaos on the people of Gotham, Batman must accept one of the greatest psychological and physical tests of his ability to fight injustice.",
    },
    Movie {
        title: "Pulp Fiction",
        movie_id: 5,
        year: 1994,
        plot: "The lives of two mob hitmen, a boxer, a gangster and his wife, and a pair of diner bandits intertwine in four tales of violence and redemption.",
    },
];

pub const RATINGS: &[Rating] = &[
    Rating { user: "darrel", movie: "be quiet and drive", rating: 3, timestamp: 1925 },
    Rating { user: "Alice", movie: "The Shawshank Redemption", rating: 4, timestamp: 1234567890 },
    Rating { user: "Bob", movie: "The Godfather", rating: 5, timestamp: 2345678901 },
    Rating { user: "Charlie", movie: "The Dark Knight", rating: 5, timestamp: 3456789012 },
    Rating { user: "Dave", movie: "Pulp Fiction", rating: 4, timestamp: 4567890123 },
    Rating { user: "Alice", movie: "Pulp Fiction", rating: 1, timestamp: 4564590123 },
    Rating { user: "Charlie", movie: "Pulp Fiction", rating: 5, timestamp: 4564590123 },
    Rating { user: "Dave", movie: "be quiet and drive", rating: 5, timestamp: 4564590123 },
    Rating { user: "darrel", movie: "The Godfather", rating: 1, timestamp: 4564324123 },
    Rating { user: "Bob", movie: "The Dark Knight", rating: 1, timestamp: 4564324123 },
];

impl User {
    pub fn spec(&self) -> NodeSpec {
        NodeSpec::new(USER)
            .with("name", self.name)
            .with("userId", self.user_id)
    }
}

impl Movie {
    pub fn spec(&self) -> NodeSpec {
        NodeSpec::new(MOVIE)
            .with("title", self.title)
            .with("movieId", self.movie_id)
            .with("year", self.year)
            .with("plot", self.plot)
    }
}

impl Rating {
    pub fn user_matcher(&self) -> NodeMatcher {
        user_by_name(self.user)
    }

    pub fn movie_matcher(&self) -> NodeMatcher {
        movie_by_title(self.movie)
    }

    pub fn properties(&self) -> PropertyMap {
        PropertyMap::new()
            .with("rating", self.rating)
            .with("timestamp", self.timestamp)
    }
}

pub fn user_by_name(name: &str) -> NodeMatcher {
    NodeMatcher::new(USER, "name", name)
}

pub fn movie_by_title(title: &str) -> NodeMatcher {
    NodeMatcher::new(MOVIE, "title", title)
}
