use super::*;
use axum::http::HeaderMap;

const TOKEN: &str = "550e8400-e29b-41d4-a716-446655440000";

fn headers_with(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("authorization", value.parse().unwrap());
    headers
}

#[cfg(test)]
mod extract_bearer_token_tests {
    use super::*;

    #[test]
    fn valid_bearer_token() {
        let headers = headers_with(&format!("Bearer {}", TOKEN));
        assert_eq!(extract_bearer_token(&headers), Ok(TOKEN.to_string()));
    }

    #[test]
    fn valid_bearer_token_with_extra_whitespace() {
        let headers = headers_with(&format!("Bearer   {}  ", TOKEN));
        assert_eq!(extract_bearer_token(&headers), Ok(TOKEN.to_string()));
    }

    #[test]
    fn case_insensitive_bearer() {
        let headers = headers_with(&format!("bearer {}", TOKEN));
        assert_eq!(extract_bearer_token(&headers), Ok(TOKEN.to_string()));
    }

    #[test]
    fn missing_authorization_header() {
        let headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), Err(TokenError::Missing));
    }

    #[test]
    fn missing_bearer_prefix() {
        let headers = headers_with(TOKEN);
        assert_eq!(extract_bearer_token(&headers), Err(TokenError::InvalidFormat));
    }

    #[test]
    fn wrong_auth_scheme() {
        let headers = headers_with("Basic dXNlcjpwYXNz");
        assert_eq!(extract_bearer_token(&headers), Err(TokenError::InvalidFormat));
    }

    #[test]
    fn bearer_with_empty_token() {
        let headers = headers_with("Bearer  ");
        assert_eq!(extract_bearer_token(&headers), Err(TokenError::Empty));
    }
}

#[cfg(test)]
mod extract_connect_token_tests {
    use super::*;

    #[test]
    fn query_token_wins_over_header() {
        let headers = headers_with("Bearer from-header");
        assert_eq!(
            extract_connect_token(&headers, Some("from-query")),
            Ok("from-query".to_string())
        );
    }

    #[test]
    fn falls_back_to_header() {
        let headers = headers_with(&format!("Bearer {}", TOKEN));
        assert_eq!(extract_connect_token(&headers, None), Ok(TOKEN.to_string()));
    }

    #[test]
    fn empty_query_token() {
        assert_eq!(
            extract_connect_token(&HeaderMap::new(), Some(" ")),
            Err(TokenError::Empty)
        );
    }

    #[test]
    fn nothing_provided() {
        assert_eq!(
            extract_connect_token(&HeaderMap::new(), None),
            Err(TokenError::Missing)
        );
    }
}
