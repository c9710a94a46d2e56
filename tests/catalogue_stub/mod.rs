use std::sync::mpsc;
use std::thread;
use std::time::Duration;

const RATINGS: [&str; 5] = ["One", "Two", "Three", "Four", "Five"];

#[derive(Debug, Clone, Default)]
pub struct CatalogueStubConfig {
    /// Pages answered with `500 Internal Server Error`.
    pub failing_pages: Vec<u32>,
    /// Pages answered with `200 OK` but without any product markup.
    pub malformed_pages: Vec<u32>,
    /// Pages whose first product shows "Price on request" instead of a price.
    pub unpriced_pages: Vec<u32>,
}

/// Serves `/catalogue/page-N.html` with two products per page:
/// `Book N.1` (rated, in stock) and `Book N.2` (out of stock; unrated on page 1).
pub struct CatalogueStub {
    pub base_url: String,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl CatalogueStub {
    pub fn spawn(config: CatalogueStubConfig) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start catalogue stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let page = request
                    .url()
                    .strip_prefix("/catalogue/page-")
                    .and_then(|rest| rest.strip_suffix(".html"))
                    .and_then(|number| number.parse::<u32>().ok());

                let (status, body) = match page {
                    Some(page) if config.failing_pages.contains(&page) => {
                        (500, "internal server error".to_owned())
                    }
                    Some(page) if config.malformed_pages.contains(&page) => (
                        200,
                        "<!doctype html><html><body><p>Down for maintenance</p></body></html>"
                            .to_owned(),
                    ),
                    Some(page) => (
                        200,
                        catalogue_page(page, config.unpriced_pages.contains(&page)),
                    ),
                    None => (404, "not found".to_owned()),
                };

                let mut response = tiny_http::Response::from_string(body).with_status_code(status);
                if status == 200 {
                    let header = tiny_http::Header::from_bytes(
                        &b"Content-Type"[..],
                        &b"text/html; charset=utf-8"[..],
                    )
                    .expect("build header");
                    response = response.with_header(header);
                }
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn catalogue_url(&self) -> String {
        format!("{}/catalogue/", self.base_url)
    }
}

impl Drop for CatalogueStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn catalogue_page(page: u32, unpriced: bool) -> String {
    let rating = RATINGS[((page - 1) % 5) as usize];
    let first_price = if unpriced {
        "Price on request".to_owned()
    } else {
        format!("£1{page}.50")
    };
    let second_rating = if page == 1 {
        String::new()
    } else {
        r#"<p class="star-rating Two"><i class="icon-star"></i></p>"#.to_owned()
    };

    format!(
        r#"<!doctype html>
<html>
  <head><title>All products | Page {page}</title></head>
  <body>
    <ol class="row">
      <li class="col-xs-6">
        <article class="product_pod">
          <p class="star-rating {rating}"><i class="icon-star"></i></p>
          <h3><a href="book-{page}-1_{page}1/index.html" title="Book {page}.1">Book {page}.1</a></h3>
          <div class="product_price">
            <p class="price_color">{first_price}</p>
            <p class="instock availability">
              <i class="icon-ok"></i>
              In stock ({page} available)
            </p>
          </div>
        </article>
      </li>
      <li class="col-xs-6">
        <article class="product_pod">
          {second_rating}
          <h3><a href="book-{page}-2_{page}2/index.html" title="Book {page}.2">Book {page}.2</a></h3>
          <div class="product_price">
            <p class="price_color">£2{page}.25</p>
            <p class="instock availability">Out of stock</p>
          </div>
        </article>
      </li>
    </ol>
  </body>
</html>
"#
    )
}
