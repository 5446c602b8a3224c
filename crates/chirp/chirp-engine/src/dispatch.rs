use chirp_feed::Feed;
use chirp_wire::{Command, Request, Response};

/// Applies one request to the feed and builds its response.
///
/// `DONE` never reaches here in a well-formed run; like any command the
/// feed has no operation for, it is answered with `success: false`.
pub fn apply(request: &Request, feed: &Feed) -> Response {
    let id = request.id;
    match request.command {
        Command::Add => {
            feed.add(request.body.as_str(), request.timestamp);
            Response::status(id, true)
        }
        Command::Remove => Response::status(id, feed.remove(request.timestamp)),
        Command::Contains => Response::status(id, feed.contains(request.timestamp)),
        Command::Feed => Response::feed(id, feed.lists()),
        Command::Done | Command::Unknown => Response::status(id, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chirp_feed::Post;

    #[test]
    fn add_then_feed() {
        let feed = Feed::new();
        let add = Request::new(Command::Add, 1).with_body("hi").with_timestamp(5.0);
        assert_eq!(apply(&add, &feed), Response::status(1, true));
        assert_eq!(
            apply(&Request::new(Command::Feed, 2), &feed),
            Response::feed(2, vec![Post::new("hi", 5.0)])
        );
    }

    #[test]
    fn remove_and_contains_report_presence() {
        let feed = Feed::new();
        feed.add("hi", 5.0);
        let contains = Request::new(Command::Contains, 1).with_timestamp(5.0);
        let remove = Request::new(Command::Remove, 2).with_timestamp(5.0);

        assert_eq!(apply(&contains, &feed), Response::status(1, true));
        assert_eq!(apply(&remove, &feed), Response::status(2, true));
        assert_eq!(apply(&remove, &feed), Response::status(2, false));
        assert_eq!(apply(&contains, &feed), Response::status(1, false));
    }

    #[test]
    fn unknown_command_fails_without_touching_the_feed() {
        let feed = Feed::new();
        let req = Request::new(Command::Unknown, 9).with_body("x").with_timestamp(1.0);
        assert_eq!(apply(&req, &feed), Response::status(9, false));
        assert!(feed.is_empty());
    }
}
